pub struct DefaultsConfig {
    pub seed: u64,
    pub processes: usize,
    pub configuration_name: String,
    pub force: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            processes: 1,
            configuration_name: "Configuration".to_string(),
            force: false,
        }
    }
}
