pub mod game_installations;
pub mod mod_scan_cache;
pub mod mod_update_analysis_cache;
pub mod project_languages;
pub mod projects;
pub mod translation_units;
pub mod translation_versions;
pub mod workshop_mods;
