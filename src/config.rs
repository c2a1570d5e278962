//! Configuration for doubtdesk
//!
//! CLI arguments with environment variable fallbacks. A `.env` file is
//! loaded before parsing, so every flag can also live there.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// doubtdesk - Q&A community backend with incremental reputation
#[derive(Parser, Debug, Clone)]
#[command(name = "doubtdesk")]
#[command(about = "REST backend for a student Q&A community")]
pub struct Args {
    /// Unique node identifier, reported by /health
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store fallback, dev JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "doubtdesk")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Allowed CORS origin
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Reputation for posting an answer
    #[arg(long, env = "REP_NEW_ANSWER", default_value = "5")]
    pub rep_new_answer: i64,

    /// Reputation for having an answer accepted
    #[arg(long, env = "REP_ACCEPTED", default_value = "15")]
    pub rep_accepted: i64,

    /// Reputation per like received
    #[arg(long, env = "REP_LIKE", default_value = "2")]
    pub rep_like: i64,

    /// Reputation for asking a question
    #[arg(long, env = "REP_NEW_QUESTION", default_value = "2")]
    pub rep_new_question: i64,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        let policy = [
            self.rep_new_answer,
            self.rep_accepted,
            self.rep_like,
            self.rep_new_question,
        ];
        if policy.iter().any(|points| *points < 0) {
            return Err("Reputation points must not be negative".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["doubtdesk"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&[]);
        if args.jwt_secret.is_none() && !args.dev_mode {
            assert!(args.validate().is_err());
        }

        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_negative_policy_rejected() {
        let args = parse(&["--dev-mode", "--rep-like=-1"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_policy_defaults() {
        let args = parse(&["--dev-mode"]);
        assert_eq!(args.rep_new_answer, 5);
        assert_eq!(args.rep_accepted, 15);
        assert_eq!(args.rep_like, 2);
        assert_eq!(args.rep_new_question, 2);
    }
}
