use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub pipeline_path: PathBuf,
    pub feedback_path: PathBuf,
    pub logo_path: PathBuf,
}

impl Config {
    /// Environment overrides with the stock file names as defaults, so a
    /// bare `cargo run` next to the artifacts just works.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            pipeline_path: env_path("PIPELINE_PATH", "linear_regression_pipeline.json"),
            feedback_path: env_path("FEEDBACK_PATH", "feedback_pengantaran.xlsx"),
            logo_path: env_path("LOGO_PATH", "logo.png"),
        }
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
