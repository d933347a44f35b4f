use sea_orm::ConnectionTrait;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const CREATE_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS game_installations (
        id TEXT PRIMARY KEY NOT NULL,
        game_code TEXT NOT NULL UNIQUE,
        game_name TEXT NOT NULL,
        installation_path TEXT,
        steam_workshop_path TEXT,
        steam_app_id TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        game_installation_id TEXT NOT NULL
            REFERENCES game_installations(id) ON DELETE CASCADE,
        source_file_path TEXT,
        mod_steam_id TEXT,
        source_mod_updated INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_projects_game_mod
        ON projects(game_installation_id, mod_steam_id)"#,
    r#"CREATE TABLE IF NOT EXISTS project_languages (
        id TEXT PRIMARY KEY NOT NULL,
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        language_code TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE(project_id, language_code)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS translation_units (
        id TEXT PRIMARY KEY NOT NULL,
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        "key" TEXT NOT NULL,
        source_text TEXT NOT NULL,
        source_loc_file TEXT,
        is_obsolete INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(project_id, "key")
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_translation_units_active
        ON translation_units(project_id, is_obsolete)"#,
    r#"CREATE TABLE IF NOT EXISTS translation_versions (
        id TEXT PRIMARY KEY NOT NULL,
        unit_id TEXT NOT NULL REFERENCES translation_units(id) ON DELETE CASCADE,
        project_language_id TEXT NOT NULL
            REFERENCES project_languages(id) ON DELETE CASCADE,
        translated_text TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(unit_id, project_language_id)
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_translation_versions_unit
        ON translation_versions(unit_id)"#,
    r#"CREATE TABLE IF NOT EXISTS workshop_mods (
        workshop_id TEXT PRIMARY KEY NOT NULL,
        app_id TEXT NOT NULL,
        title TEXT NOT NULL,
        subscriptions INTEGER,
        time_updated INTEGER NOT NULL,
        preview_url TEXT,
        last_checked_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS mod_scan_cache (
        id TEXT PRIMARY KEY NOT NULL,
        pack_file_path TEXT NOT NULL UNIQUE,
        file_last_modified INTEGER NOT NULL,
        has_loc_files INTEGER NOT NULL,
        scanned_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS mod_update_analysis_cache (
        id TEXT PRIMARY KEY NOT NULL,
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        pack_file_path TEXT NOT NULL,
        file_last_modified INTEGER NOT NULL,
        new_units_count INTEGER NOT NULL DEFAULT 0,
        removed_units_count INTEGER NOT NULL DEFAULT 0,
        modified_units_count INTEGER NOT NULL DEFAULT 0,
        reactivated_units_count INTEGER NOT NULL DEFAULT 0,
        total_pack_units INTEGER NOT NULL DEFAULT 0,
        total_project_units INTEGER NOT NULL DEFAULT 0,
        analyzed_at INTEGER NOT NULL,
        UNIQUE(project_id, pack_file_path)
    )"#,
];

const DROP_TABLES: &[&str] = &[
    "mod_update_analysis_cache",
    "mod_scan_cache",
    "workshop_mods",
    "translation_versions",
    "translation_units",
    "project_languages",
    "projects",
    "game_installations",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for statement in CREATE_STATEMENTS {
            db.execute_unprepared(statement).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for table in DROP_TABLES {
            db.execute_unprepared(&format!("DROP TABLE IF EXISTS \"{}\"", table))
                .await?;
        }
        Ok(())
    }
}
