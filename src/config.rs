use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "vitrine-server", version, about = "Student curriculum showcase API")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "VITRINE_LISTEN", default_value = "0.0.0.0:3001")]
    pub listen: SocketAddr,

    /// Postgres connection string; an in-memory store is used when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: String,

    /// Plaintext or `$pbkdf2` PHC hash
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: String,

    /// Only addresses in this domain may request access codes
    #[arg(long, env = "INSTITUTION_DOMAIN", default_value = "inbec.edu.br")]
    pub institution_domain: String,

    #[arg(long, env = "UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,
}
