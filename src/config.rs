use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,

    // Security settings
    pub secret_key: String,
    pub jwt_expires_in: String,
    pub cors_allow_origin: String,

    // Media
    pub media_root: String,
    pub media_url: String,

    // Pagination
    pub page_size: i64,
    pub max_page_size: i64,

    pub shopping_list_header: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "sqlite://recipes.db?mode=rwc".to_string(),
            db_max_connections: 10,

            secret_key: "change-me".to_string(),
            jwt_expires_in: "7d".to_string(),
            cors_allow_origin: "*".to_string(),

            media_root: "./media".to_string(),
            media_url: "/media".to_string(),

            page_size: 6,
            max_page_size: 100,

            shopping_list_header: "Shopping list".to_string(),
        }
    }
}

impl Config {
    /// Built-in defaults, overridden by `.env` and then by the process environment
    /// (`PORT`, `DATABASE_URL`, `SECRET_KEY`, ...).
    pub fn from_env() -> Result<Self, ::config::ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        ::config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("database_url", defaults.database_url)?
            .set_default("db_max_connections", i64::from(defaults.db_max_connections))?
            .set_default("secret_key", defaults.secret_key)?
            .set_default("jwt_expires_in", defaults.jwt_expires_in)?
            .set_default("cors_allow_origin", defaults.cors_allow_origin)?
            .set_default("media_root", defaults.media_root)?
            .set_default("media_url", defaults.media_url)?
            .set_default("page_size", defaults.page_size)?
            .set_default("max_page_size", defaults.max_page_size)?
            .set_default("shopping_list_header", defaults.shopping_list_header)?
            .add_source(::config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn media_url_for(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.media_url.trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}
