use std::env;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc, Weekday};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub state_db_path: String,

    pub line_token: String,
    pub line_channel_secret: String,
    pub line_user_id: String,

    pub notion_token: String,
    pub notion_db_id: String,

    pub gemini_api_key: String,
    pub gemini_models: Vec<String>,

    pub user_profile: String,

    pub tz_offset_hours: i32,
    pub reminder_hour: u32,
    pub review_weekday: Weekday,
    pub review_hour: u32,
}

const DEFAULT_PROFILE: &str = "ユーザーは目標達成に向けて努力している人物です。";

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),
            state_db_path: env::var("STATE_DB_PATH")
                .unwrap_or_else(|_| "nikki_state.db".into()),

            line_token: env::var("LINE_TOKEN").expect("LINE_TOKEN must be set"),
            line_channel_secret: env::var("LINE_CHANNEL_SECRET")
                .expect("LINE_CHANNEL_SECRET must be set"),
            line_user_id: env::var("LINE_USER_ID").expect("LINE_USER_ID must be set"),

            notion_token: env::var("NOTION_TOKEN").expect("NOTION_TOKEN must be set"),
            notion_db_id: env::var("NOTION_DB_ID").expect("NOTION_DB_ID must be set"),

            gemini_api_key: env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set"),
            gemini_models: env::var("GEMINI_MODELS")
                .unwrap_or_else(|_| {
                    "gemini-3-flash,gemini-2.5-flash,gemini-2.5-flash-lite".into()
                })
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),

            user_profile: env::var("USER_PROFILE")
                .ok()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PROFILE.into()),

            tz_offset_hours: env::var("TZ_OFFSET_HOURS")
                .unwrap_or_else(|_| "9".into())
                .parse()
                .expect("TZ_OFFSET_HOURS must be a number"),
            reminder_hour: env::var("REMINDER_HOUR")
                .unwrap_or_else(|_| "21".into())
                .parse()
                .expect("REMINDER_HOUR must be a number"),
            review_weekday: env::var("REVIEW_WEEKDAY")
                .unwrap_or_else(|_| "Sun".into())
                .parse()
                .expect("REVIEW_WEEKDAY must be a weekday name"),
            review_hour: env::var("REVIEW_HOUR")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .expect("REVIEW_HOUR must be a number"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tz(&self) -> FixedOffset {
        FixedOffset::east_opt(self.tz_offset_hours * 3600)
            .expect("TZ_OFFSET_HOURS out of range")
    }

    pub fn now_local(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz())
    }

    pub fn today_local(&self) -> NaiveDate {
        self.now_local().date_naive()
    }
}
