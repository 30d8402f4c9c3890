//! First-run checks: working directories, credentials and bot connectivity

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::telegram::TelegramClient;
use crate::youtube::YouTubeCredentials;

const EXAMPLE_SCRIPT: &str = "TITLE: The Silent Heroes of Operation Overlord
DESCRIPTION: Discover the untold stories of the brave soldiers who changed the course of history during D-Day. This documentary explores lesser-known accounts from the beaches of Normandy, featuring first-hand testimonies and historical analysis.
TAGS: WWII, D-Day, Normandy, World War 2, History, Documentary, Operation Overlord, Historical Stories
SCRIPT:
June 6th, 1944. The beaches of Normandy bore witness to one of humanity's most pivotal moments. While history remembers the generals and the grand strategy, countless individual acts of heroism remain untold.

Today, we uncover the silent heroes of Operation Overlord. These are the stories of men whose courage shaped history, yet their names were never written in textbooks.

In the predawn darkness of that fateful day, thousands of paratroopers descended behind enemy lines. Among them was Private James Miller, a 19-year-old from Ohio, carrying nothing but his rifle and an unwavering determination.

[Continue with your full narration script...]
";

/// Outcome of one configuration variable check
#[derive(Debug, Clone, PartialEq)]
pub struct VariableCheck {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    /// Masked value when set
    pub display: Option<String>,
}

impl VariableCheck {
    pub fn passed(&self) -> bool {
        !self.required || self.display.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetupReport {
    pub variables: Vec<VariableCheck>,
    pub youtube_credentials_valid: bool,
    pub telegram_connected: bool,
}

impl SetupReport {
    pub fn all_passed(&self) -> bool {
        self.variables.iter().all(VariableCheck::passed)
            && self.youtube_credentials_valid
            && self.telegram_connected
    }
}

/// Show only the edges of a secret
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 15 {
        return "***".to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Create each directory with a `.gitkeep` so it survives in git
pub fn create_directories(dirs: &[&Path]) -> Result<()> {
    info!("📁 Creating directories...");
    for dir in dirs {
        std::fs::create_dir_all(dir)?;
        let gitkeep = dir.join(".gitkeep");
        if !gitkeep.exists() {
            std::fs::write(&gitkeep, b"")?;
        }
        info!("  ✅ {}/", dir.display());
    }
    Ok(())
}

pub fn check_variables(config: &Config) -> Vec<VariableCheck> {
    let secret = |value: Option<&String>| value.map(|v| mask_secret(v));

    vec![
        VariableCheck {
            name: "TELEGRAM_BOT_TOKEN",
            description: "Telegram bot token from @BotFather",
            required: true,
            display: secret(config.telegram.bot_token.as_ref()),
        },
        VariableCheck {
            name: "TELEGRAM_CHAT_ID",
            description: "Your Telegram chat ID",
            required: true,
            display: config.telegram.chat_id.map(|id| id.to_string()),
        },
        VariableCheck {
            name: "YOUTUBE_CREDENTIALS",
            description: "YouTube OAuth credentials JSON",
            required: true,
            display: secret(config.youtube.credentials.as_ref()),
        },
        VariableCheck {
            name: "GITHUB_TOKEN",
            description: "GitHub personal access token (for the request bot)",
            required: false,
            display: secret(config.github.token.as_ref()),
        },
        VariableCheck {
            name: "GITHUB_REPO",
            description: "GitHub repository (owner/name)",
            required: false,
            display: config.github.repo.clone(),
        },
        VariableCheck {
            name: "TELEGRAM_WEBHOOK_URL",
            description: "Bot webhook URL (for the webhook server)",
            required: false,
            display: config.telegram.webhook_url.clone(),
        },
    ]
}

pub fn validate_youtube_credentials(credentials: Option<&str>) -> bool {
    let Some(credentials) = credentials else {
        return false;
    };

    match serde_json::from_str::<serde_json::Value>(credentials) {
        Ok(value) => {
            let missing = YouTubeCredentials::missing_keys(&value);
            if missing.is_empty() {
                info!("  ✅ YouTube credentials format is valid");
                true
            } else {
                warn!("  ⚠️ YouTube credentials missing keys: {}", missing.join(", "));
                false
            }
        }
        Err(_) => {
            warn!("  ❌ YouTube credentials is not valid JSON");
            false
        }
    }
}

async fn test_telegram_connection(config: &Config) -> bool {
    let client = match TelegramClient::from_config(&config.telegram) {
        Ok(client) => client,
        Err(_) => {
            warn!("  ⚠️ Cannot test: TELEGRAM_BOT_TOKEN not set");
            return false;
        }
    };

    match client.get_me().await {
        Ok(bot) => {
            info!(
                "  ✅ Bot connected: @{} ({})",
                bot.username.as_deref().unwrap_or("?"),
                bot.first_name
            );
            true
        }
        Err(e) => {
            warn!("  ❌ Bot connection failed: {}", e);
            false
        }
    }
}

/// Write the example request next to the working directories
pub fn create_example_script(path: &Path) -> Result<bool> {
    if path.exists() {
        info!("  ℹ️ {} already exists", path.display());
        return Ok(false);
    }
    std::fs::write(path, EXAMPLE_SCRIPT)?;
    info!("  ✅ Created {}", path.display());
    Ok(true)
}

pub async fn run(config: &Config) -> Result<SetupReport> {
    info!("🎬 History Video Bot - Setup");

    create_directories(&config.paths.working_dirs())?;

    info!("🔍 Checking configuration variables...");
    let variables = check_variables(config);
    for check in &variables {
        match (&check.display, check.required) {
            (Some(shown), _) => info!("  ✅ {}: {}", check.name, shown),
            (None, true) => warn!("  ❌ {}: NOT SET ({})", check.name, check.description),
            (None, false) => info!("  ⚠️ {}: not set ({})", check.name, check.description),
        }
    }

    let youtube_credentials_valid = validate_youtube_credentials(config.youtube.credentials.as_deref());

    info!("🤖 Testing Telegram bot connection...");
    let telegram_connected = test_telegram_connection(config).await;

    create_example_script(Path::new("example_script.txt"))?;

    let report = SetupReport {
        variables,
        youtube_credentials_valid,
        telegram_connected,
    };

    if report.all_passed() {
        info!("✅ All checks passed! Send /start to your bot to begin.");
    } else {
        warn!("⚠️ Some checks failed. Fix the issues above and run setup again.");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use tempfile::TempDir;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("1234567890:ABCDEFGHIJ"), "1234567890...FGHIJ");
    }

    #[test]
    fn test_create_directories_with_gitkeep() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigBuilder::new().with_work_dir(temp_dir.path()).build();

        create_directories(&config.paths.working_dirs()).unwrap();
        for dir in config.paths.working_dirs() {
            assert!(dir.join(".gitkeep").exists());
        }
        // Second run is a no-op
        create_directories(&config.paths.working_dirs()).unwrap();
    }

    #[test]
    fn test_variable_checks() {
        let config = ConfigBuilder::new().with_telegram("1234567890:ABCDEFGHIJ", 7).build();
        let checks = check_variables(&config);

        let token = checks.iter().find(|c| c.name == "TELEGRAM_BOT_TOKEN").unwrap();
        assert_eq!(token.display.as_deref(), Some("1234567890...FGHIJ"));
        let chat = checks.iter().find(|c| c.name == "TELEGRAM_CHAT_ID").unwrap();
        assert_eq!(chat.display.as_deref(), Some("7"));

        let youtube = checks.iter().find(|c| c.name == "YOUTUBE_CREDENTIALS").unwrap();
        assert!(!youtube.passed());
        assert!(checks.iter().find(|c| c.name == "GITHUB_REPO").unwrap().passed());
    }

    #[test]
    fn test_validate_youtube_credentials() {
        assert!(!validate_youtube_credentials(None));
        assert!(!validate_youtube_credentials(Some("{")));
        assert!(!validate_youtube_credentials(Some(r#"{"token": "t"}"#)));
        assert!(validate_youtube_credentials(Some(
            r#"{"token": "t", "refresh_token": "r", "client_id": "c", "client_secret": "s"}"#
        )));
    }

    #[test]
    fn test_example_script_is_a_valid_request() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("example_script.txt");

        assert!(create_example_script(&path).unwrap());
        assert!(!create_example_script(&path).unwrap());

        let request = crate::bot::parse_production_message(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(request.title, "The Silent Heroes of Operation Overlord");
        assert_eq!(request.tags.len(), 8);
        assert!(request.script.starts_with("June 6th, 1944."));
    }
}
