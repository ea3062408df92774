use procgraph::core::data::CoreData;
use procgraph::engine::config::GenerateConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub procedure_path: PathBuf,
    pub core_data: CoreData,
    pub generate: GenerateConfig,
}
