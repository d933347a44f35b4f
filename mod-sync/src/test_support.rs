//! Seeded databases and in-process fakes for the external collaborators

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::core::path_utils::path_key;
use crate::core::task_control::TaskControl;
use crate::data::database::{
    test_database, GameInstallationQueries, NewUnitRow, ProjectQueries, TranslationQueries,
};
use crate::error::{ApiError, ApiResult};
use crate::models::{GameInstallation, ModArchiveRecord, Project, RemoteModRecord};
use crate::services::RemoteCatalog;
use crate::tools::{ArchiveExtractor, ArchiveInspector, ExtractedLocFiles};

pub const GAME_CODE: &str = "wh3";
pub const STEAM_APP_ID: &str = "1142710";

/// Ids of the rows created by `seeded_database`
pub struct Fixture {
    pub installation_id: String,
    pub project_id: String,
    pub workshop_id: String,
    pub language_ids: Vec<String>,
}

fn installation(id: &str, workshop_path: Option<&Path>) -> GameInstallation {
    GameInstallation {
        id: id.to_string(),
        game_code: GAME_CODE.to_string(),
        game_name: "Total War: WARHAMMER III".to_string(),
        installation_path: None,
        workshop_path: workshop_path.map(|p| p.to_string_lossy().into_owned()),
        steam_app_id: Some(STEAM_APP_ID.to_string()),
    }
}

/// One installation, one project imported from Workshop mod 5, languages en and fr
pub async fn seeded_database() -> (DatabaseConnection, Fixture) {
    let conn = test_database().await;
    let installation_id = "install-1".to_string();
    GameInstallationQueries::upsert(&conn, &installation(&installation_id, None))
        .await
        .unwrap();

    let mut fixture = Fixture {
        installation_id,
        project_id: String::new(),
        workshop_id: "5".to_string(),
        language_ids: Vec::new(),
    };
    let project_id = insert_project(&conn, &fixture, "Mod Five", Some("5")).await;
    for code in ["en", "fr"] {
        let id = ProjectQueries::add_language(&conn, &project_id, code)
            .await
            .unwrap();
        fixture.language_ids.push(id);
    }
    fixture.project_id = project_id;
    (conn, fixture)
}

/// Point the seeded installation at a Workshop content folder
pub async fn set_workshop_path(conn: &DatabaseConnection, fixture: &Fixture, root: &Path) {
    GameInstallationQueries::upsert(conn, &installation(&fixture.installation_id, Some(root)))
        .await
        .unwrap();
}

/// Extra project under the seeded installation, without languages
pub async fn insert_project(
    conn: &DatabaseConnection,
    fixture: &Fixture,
    name: &str,
    mod_steam_id: Option<&str>,
) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    ProjectQueries::insert(
        conn,
        &Project {
            id: id.clone(),
            name: name.to_string(),
            game_installation_id: fixture.installation_id.clone(),
            source_file_path: None,
            mod_steam_id: mod_steam_id.map(str::to_string),
            source_mod_updated: None,
        },
    )
    .await
    .unwrap();
    id
}

/// Units of the seeded project, each with a pending version per language
pub async fn seed_units(
    conn: &DatabaseConnection,
    fixture: &Fixture,
    active: &[(&str, &str)],
    obsolete: &[(&str, &str)],
) {
    let rows: Vec<NewUnitRow> = active
        .iter()
        .chain(obsolete.iter())
        .map(|(key, text)| NewUnitRow {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.to_string(),
            source_text: text.to_string(),
            source_loc_file: Some("text/db/seed.loc.tsv".to_string()),
        })
        .collect();
    TranslationQueries::insert_units(conn, &fixture.project_id, &rows, 1)
        .await
        .unwrap();
    let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
    TranslationQueries::insert_pending_versions(conn, &ids, &fixture.language_ids, 1)
        .await
        .unwrap();

    let obsolete_keys: Vec<String> = obsolete.iter().map(|(key, _)| key.to_string()).collect();
    TranslationQueries::set_obsolete(conn, &fixture.project_id, &obsolete_keys, true, 1)
        .await
        .unwrap();
}

pub fn archive_record(workshop_id: &str, archive_path: &str, last_modified: i64) -> ModArchiveRecord {
    let archive_path = PathBuf::from(archive_path);
    ModArchiveRecord {
        workshop_id: workshop_id.to_string(),
        directory_path: archive_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
        archive_base_name: archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        archive_path,
        last_modified,
        image_path: None,
    }
}

pub fn remote_record(workshop_id: &str, title: &str, time_updated: i64) -> RemoteModRecord {
    RemoteModRecord {
        workshop_id: workshop_id.to_string(),
        app_id: STEAM_APP_ID.to_string(),
        title: title.to_string(),
        subscriptions: Some(10),
        time_updated,
        preview_url: None,
        last_checked_at: 1,
    }
}

/// Pack listings held in memory, keyed by `path_key`
pub struct FakeInspector {
    contents: Mutex<HashMap<String, Vec<String>>>,
    failing: Mutex<HashSet<String>>,
    available: AtomicBool,
    calls: AtomicUsize,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self {
            contents: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_contents(&self, archive_path: &str, entries: &[&str]) {
        self.contents.lock().unwrap().insert(
            path_key(Path::new(archive_path)),
            entries.iter().map(|e| e.to_string()).collect(),
        );
    }

    pub fn set_failing(&self, archive_path: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(path_key(Path::new(archive_path)));
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveInspector for FakeInspector {
    async fn list_contents(
        &self,
        _game_code: &str,
        archive_path: &Path,
        task: &TaskControl,
    ) -> ApiResult<Vec<String>> {
        task.ensure_not_cancelled("Listing")?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = path_key(archive_path);
        if self.failing.lock().unwrap().contains(&key) {
            return Err(ApiError::tool_failure(format!("cannot open {}", key)));
        }
        Ok(self
            .contents
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

type PackFiles = Vec<(String, Vec<(String, String)>)>;

/// Writes configured TSV tables into the output directory like the real tool
pub struct FakeExtractor {
    packs: Mutex<HashMap<String, PackFiles>>,
    failing: AtomicBool,
    cancel_during: AtomicBool,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            packs: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            cancel_during: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Cancel the caller's task once the files are written, as if the user
    /// stopped the scan while the tool was running
    pub fn set_cancel_during_extraction(&self, cancel: bool) {
        self.cancel_during.store(cancel, Ordering::SeqCst);
    }

    /// `files` are `(relative path, [(key, text)])`
    pub fn set_pack(&self, archive_path: &str, files: Vec<(&str, Vec<(&str, &str)>)>) {
        let files = files
            .into_iter()
            .map(|(name, rows)| {
                (
                    name.to_string(),
                    rows.into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                )
            })
            .collect();
        self.packs
            .lock()
            .unwrap()
            .insert(path_key(Path::new(archive_path)), files);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn extract_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveExtractor for FakeExtractor {
    async fn extract_tabular(
        &self,
        _game_code: &str,
        archive_path: &Path,
        output_dir: &Path,
        task: &TaskControl,
    ) -> ApiResult<ExtractedLocFiles> {
        task.ensure_not_cancelled("Extraction")?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::tool_failure("rpfm_cli exited with status 1"));
        }

        let files = self
            .packs
            .lock()
            .unwrap()
            .get(&path_key(archive_path))
            .cloned()
            .unwrap_or_default();
        let mut extracted = Vec::new();
        for (relative, rows) in files {
            let path = output_dir.join(&relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut content = String::from("key\ttext\ttooltip\n#Loc;1;text/db/fake.loc\t\t\n");
            for (key, text) in rows {
                content.push_str(&format!("{}\t{}\tfalse\n", key, text));
            }
            std::fs::write(&path, content)?;
            extracted.push(path);
        }
        extracted.sort();
        if self.cancel_during.load(Ordering::SeqCst) {
            task.cancel();
        }

        Ok(ExtractedLocFiles {
            extracted_files: extracted,
            output_directory: output_dir.to_path_buf(),
        })
    }
}

/// Workshop catalog answering from memory
pub struct FakeCatalog {
    records: Mutex<HashMap<String, RemoteModRecord>>,
    failing: AtomicBool,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_record(&self, record: RemoteModRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.workshop_id.clone(), record);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteCatalog for FakeCatalog {
    async fn fetch_batch(
        &self,
        workshop_ids: &[String],
        _app_id: &str,
    ) -> ApiResult<HashMap<String, RemoteModRecord>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::network("Steam API unreachable"));
        }
        let records = self.records.lock().unwrap();
        Ok(workshop_ids
            .iter()
            .filter_map(|id| records.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }
}
