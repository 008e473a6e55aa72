use log::LevelFilter;

pub struct Logger;

impl Logger {
    /// Installs the colog formatter on top of env_logger. `RUST_LOG`
    /// still wins for per-module filters.
    pub fn init(verbosity: LevelFilter) {
        let mut builder = colog::default_builder();
        builder.filter_level(verbosity);
        builder.parse_default_env();

        // a second init (tests) is harmless
        let _ = builder.try_init();
    }
}
