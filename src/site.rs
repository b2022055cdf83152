// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Site profile: entry URL and UI selectors of the automated application
//!
//! The defaults target the podcast generator this crate was built for.
//! Everything here is data; replace fields when the site changes.

use regex::Regex;
use url::Url;

use crate::driver::UrlPattern;

lazy_static::lazy_static! {
    /// Task pages live under `/chat/<numeric id>`
    static ref TASK_URL_RE: Regex = Regex::new(r"/chat/\d+").expect("valid task url regex");
}

const DEFAULT_BASE_URL: &str = "https://www.doubao.com/chat/";
const RESULT_CARD: &str = r#"div[data-plugin-identifier="Symbol(receive-podcast-content)"] >> nth=-1"#;

/// URLs and selectors of the automated application
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Entry point and base conversation view
    pub base_url: Url,
    /// Only rendered for a logged-in user
    pub logged_in_marker: String,
    /// Opens the login dialog
    pub login_button: String,
    /// Switches the login dialog to QR mode
    pub qr_switcher: String,
    /// Offset of the QR toggle inside the switcher
    pub qr_switcher_offset: (f64, f64),
    /// QR code image
    pub qr_image: String,
    /// Data-URI prefix stripped from the QR image `src`
    pub qr_data_prefix: String,
    /// Starts a new conversation
    pub new_conversation_button: String,
    /// Expands the skill bar
    pub skill_menu_button: String,
    /// Document-processing skill entry
    pub skill_button: String,
    /// Opens the upload panel
    pub upload_button: String,
    /// Upload entry that opens the file chooser
    pub upload_item: String,
    /// Sends the prepared message
    pub send_button: String,
    /// Matches a task-specific location
    pub task_url_pattern: Regex,
    /// Title of the latest result card
    pub result_title: String,
    /// Download control of the latest result card
    pub download_button: String,
    /// Class fragment marking the download control as not ready
    pub disabled_class: String,
    /// Title reported while the real one cannot be read
    pub title_placeholder: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid default base url"),
            logged_in_marker: "[data-testid='chat_header_avatar_button']".to_string(),
            login_button: "[data-testid='to_login_button']".to_string(),
            qr_switcher: "[data-testid='qrcode_switcher']".to_string(),
            qr_switcher_offset: (51.0, 5.0),
            qr_image: "[data-testid='qrcode_image']".to_string(),
            qr_data_prefix: "data:image/png;base64,".to_string(),
            new_conversation_button: "[data-testid='create_conversation_button']".to_string(),
            skill_menu_button: "[data-testid='skill_bar_button_more']".to_string(),
            skill_button: "[data-testid='skill_bar_button_26'] >> text=AI 播客".to_string(),
            upload_button: "[data-testid='upload_file_button']".to_string(),
            upload_item: "[data-testid='upload_file_panel_upload_item']".to_string(),
            send_button: "[data-testid='chat_input_send_button']".to_string(),
            task_url_pattern: TASK_URL_RE.clone(),
            result_title: format!(r#"{} >> [class*="title-"]"#, RESULT_CARD),
            download_button: format!(
                r#"{} >> div[class*="actionBtn-"]:has(span[class*="downloadBtn"])"#,
                RESULT_CARD
            ),
            disabled_class: "disabled".to_string(),
            title_placeholder: "播客生成中...".to_string(),
        }
    }
}

impl SiteProfile {
    /// Create the default profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Base conversation view as a string
    pub fn base_url_str(&self) -> &str {
        self.base_url.as_str()
    }

    /// Pattern matching the base conversation view
    pub fn base_url_pattern(&self) -> UrlPattern {
        UrlPattern::Exact(self.base_url.to_string())
    }

    /// Pattern matching any task location
    pub fn task_url_pattern(&self) -> UrlPattern {
        UrlPattern::Regex(self.task_url_pattern.clone())
    }

    /// Location of a task
    pub fn task_url(&self, task_id: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(task_id)
    }

    /// Location of a task, `None` unless `task_id` is exactly the final
    /// segment of a location matching the task pattern
    pub fn checked_task_url(&self, task_id: &str) -> Option<Url> {
        if task_id.is_empty() {
            return None;
        }
        let url = self.task_url(task_id).ok()?;
        let round_trips = task_id_from_url(url.as_str()).as_deref() == Some(task_id);

        (round_trips && self.task_url_pattern.is_match(url.as_str())).then_some(url)
    }

    /// Strip the data-URI prefix from a QR image `src`
    pub fn qr_payload<'a>(&self, src: &'a str) -> &'a str {
        src.strip_prefix(self.qr_data_prefix.as_str()).unwrap_or(src)
    }

    /// Whether a download control class list means "ready"
    pub fn is_download_enabled(&self, class: Option<&str>) -> bool {
        match class {
            Some(class) => !class.contains(self.disabled_class.as_str()),
            None => false,
        }
    }
}

/// Final path segment of a task location, `None` when empty
pub fn task_id_from_url(location: &str) -> Option<String> {
    let segment = match Url::parse(location) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => location.rsplit('/').next().map(str::to_string),
    };

    segment.filter(|s| !s.is_empty())
}
