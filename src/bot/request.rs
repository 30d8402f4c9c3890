use chrono::NaiveDate;

use crate::collector::request::parse_tags;
use crate::production::{ProductionRecord, ProductionStatus};

/// A production request sent in one message with labelled sections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionRequest {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub script: String,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Title,
    Description,
    Tags,
    Script,
}

const SECTIONS: [(&str, Section); 4] = [
    ("TITLE:", Section::Title),
    ("DESCRIPTION:", Section::Description),
    ("TAGS:", Section::Tags),
    ("SCRIPT:", Section::Script),
];

/// Section starting `line`, with the remainder of the line
fn section_header(line: &str) -> Option<(Section, &str)> {
    SECTIONS.iter().find_map(|(label, section)| {
        let head = line.get(..label.len())?;
        head.eq_ignore_ascii_case(label)
            .then(|| (*section, line[label.len()..].trim()))
    })
}

/// Whether a message should be treated as a production request
pub fn is_production_request(text: &str) -> bool {
    matches!(section_header(text.trim_start()), Some((Section::Title, _)))
}

/// Parse a `TITLE:` / `DESCRIPTION:` / `TAGS:` / `SCRIPT:` message.
///
/// Description and script continue over the following lines until the
/// next header.
pub fn parse_production_message(text: &str) -> ProductionRequest {
    let mut request = ProductionRequest::default();
    let mut current = None;

    for line in text.trim().lines() {
        let line = line.trim();

        if let Some((section, rest)) = section_header(line) {
            current = Some(section);
            match section {
                Section::Title => request.title = rest.to_string(),
                Section::Description => request.description = rest.to_string(),
                Section::Tags => request.tags = parse_tags(rest),
                Section::Script => request.script = rest.to_string(),
            }
            continue;
        }

        match current {
            Some(Section::Script) => {
                request.script.push('\n');
                request.script.push_str(line);
            }
            Some(Section::Description) => {
                request.description.push('\n');
                request.description.push_str(line);
            }
            _ => {}
        }
    }

    request.script = request.script.trim().to_string();
    request.description = request.description.trim().to_string();
    request
}

impl ProductionRequest {
    pub fn default_title(today: NaiveDate) -> String {
        format!("WWII Story - {}", today.format("%Y-%m-%d"))
    }

    /// Pending record for this request; `None` when there is no script
    pub fn into_record(self, chat_id: i64, today: NaiveDate) -> Option<ProductionRecord> {
        if self.script.is_empty() {
            return None;
        }

        let title = if self.title.is_empty() {
            Self::default_title(today)
        } else {
            self.title
        };

        Some(
            ProductionRecord::new(title, self.description, self.tags, self.script, ProductionStatus::Pending)
                .with_chat_id(chat_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &str = "TITLE: Operation Overlord\n\
        DESCRIPTION: The largest seaborne invasion.\n\
        Told from the beaches.\n\
        TAGS: WWII, D-Day, , Normandy\n\
        SCRIPT:\n\
        On the sixth of June 1944,\n\
        the Allies landed in Normandy.";

    #[test]
    fn test_parse_all_sections() {
        let request = parse_production_message(MESSAGE);
        assert_eq!(request.title, "Operation Overlord");
        assert_eq!(request.description, "The largest seaborne invasion.\nTold from the beaches.");
        assert_eq!(request.tags, vec!["WWII", "D-Day", "Normandy"]);
        assert_eq!(request.script, "On the sixth of June 1944,\nthe Allies landed in Normandy.");
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        assert!(is_production_request("title: lower case"));
        assert!(is_production_request("  TITLE: padded"));
        assert!(!is_production_request("SCRIPT: no title first"));
        assert!(!is_production_request("hello"));

        let request = parse_production_message("title: x\nscript: words here");
        assert_eq!(request.script, "words here");
    }

    #[test]
    fn test_into_record_defaults_title_and_rejects_empty_script() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();

        let request = parse_production_message("TITLE:\nSCRIPT: Some narration");
        let record = request.into_record(42, today).unwrap();
        assert_eq!(record.title, "WWII Story - 2024-06-06");
        assert_eq!(record.status, ProductionStatus::Pending);
        assert_eq!(record.chat_id, Some(42));
        assert_eq!(record.word_count, 2);

        let request = parse_production_message("TITLE: No script\nSCRIPT:   ");
        assert!(request.into_record(42, today).is_none());
    }
}
