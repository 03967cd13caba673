use chrono::{DateTime, Utc};

use crate::course::{Query, SectionRecord};

const TIME_FORMAT: &str = "%-I:%M%p";
const UNKNOWN_FIELD: &str = "[unknown]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Platform-neutral embed, turned into a serenity builder right before sending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value
        .map(|x| x.to_string())
        .unwrap_or_else(|| UNKNOWN_FIELD.to_owned())
}

/// Renders one section, stamped with the time the data was fetched.
pub fn section_embed(query: &Query, record: &SectionRecord, fetched: DateTime<Utc>) -> Embed {
    let days = match record.days_of_week {
        Some(ref days) if !days.is_empty() => days.join(", "),
        _ => UNKNOWN_FIELD.to_owned(),
    };
    let days_label = match record.days_of_week.as_ref().map(Vec::len) {
        Some(1) => "Day of Week",
        _ => "Days of Week",
    };

    Embed {
        title: Some(format!("{} - {}", query.course, query.semester)),
        author: Some(or_unknown(record.instructor.as_deref())),
        timestamp: Some(fetched),
        footer: Some("Last fetched".to_owned()),
        ..Default::default()
    }
    .field("Section", or_unknown(record.section.as_deref()), true)
    .field("Type", or_unknown(record.class_type.as_deref()), true)
    .field("Room", or_unknown(record.room.as_deref()), true)
    .field("Open", or_unknown(record.is_open), true)
    .field(
        "Seats",
        format!(
            "{}/{}",
            or_unknown(record.open_seats),
            or_unknown(record.total_seats)
        ),
        true,
    )
    .field(days_label, days, false)
    .field(
        "Time",
        format!(
            "{} - {}",
            or_unknown(record.start_time.map(|x| x.format(TIME_FORMAT))),
            or_unknown(record.end_time.map(|x| x.format(TIME_FORMAT))),
        ),
        true,
    )
}

/// Longest message content Discord accepts, in characters.
pub const MAX_CONTENT_LENGTH: usize = 2000;

// room kept for the "...and N more" line
const MORE_RESERVE: usize = 24;

fn section_line(record: &SectionRecord) -> String {
    format!(
        "`{}` {} - {} ({}/{} open)",
        or_unknown(record.section.as_deref()),
        or_unknown(record.class_type.as_deref()),
        or_unknown(record.instructor.as_deref()),
        or_unknown(record.open_seats),
        or_unknown(record.total_seats),
    )
}

/// One line per section, used when asking the caller to pick one. Stops with
/// a "...and N more" line before the text grows past `budget` characters.
pub fn section_lines(sections: &[SectionRecord], budget: usize) -> String {
    let mut lines = String::new();
    let mut used = 0;

    for (n, record) in sections.iter().enumerate() {
        let line = section_line(record);
        let width = line.chars().count() + usize::from(!lines.is_empty());
        let last = n + 1 == sections.len();
        let reserve = if last { 0 } else { MORE_RESERVE };

        if used + width + reserve > budget {
            if !lines.is_empty() {
                lines.push('\n');
            }
            lines.push_str(&format!("...and {} more", sections.len() - n));
            break;
        }

        if !lines.is_empty() {
            lines.push('\n');
        }
        lines.push_str(&line);
        used += width;
    }

    lines
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone};

    use super::*;

    fn record() -> SectionRecord {
        SectionRecord {
            class_id: Some(19_311),
            section: Some("A1".to_owned()),
            class_type: Some("LEC".to_owned()),
            instructor: Some("Hertz".to_owned()),
            room: None,
            days_of_week: Some(vec!["Mon".to_owned(), "Wed".to_owned()]),
            start_time: NaiveTime::from_hms_opt(9, 0, 0),
            end_time: NaiveTime::from_hms_opt(13, 50, 0),
            is_open: Some(true),
            open_seats: Some(3),
            total_seats: Some(180),
        }
    }

    fn value<'a>(embed: &'a Embed, name: &str) -> &'a str {
        &embed
            .fields
            .iter()
            .find(|field| field.name == name)
            .unwrap()
            .value
    }

    #[test]
    fn renders_known_and_unknown_fields() {
        let query = Query::from_ids("CSE 116".into(), "fall2024".into(), "UGRD".into());
        let fetched = Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap();
        let embed = section_embed(&query, &record(), fetched);

        assert_eq!(embed.title.as_deref(), Some("CSE 116 - fall2024"));
        assert_eq!(embed.author.as_deref(), Some("Hertz"));
        assert_eq!(embed.timestamp, Some(fetched));
        assert_eq!(value(&embed, "Room"), UNKNOWN_FIELD);
        assert_eq!(value(&embed, "Seats"), "3/180");
        assert_eq!(value(&embed, "Days of Week"), "Mon, Wed");
        assert_eq!(value(&embed, "Time"), "9:00AM - 1:50PM");
    }

    #[test]
    fn single_day_label() {
        let query = Query::from_ids("CSE 116".into(), "fall2024".into(), "UGRD".into());
        let record = SectionRecord {
            days_of_week: Some(vec!["Fri".to_owned()]),
            ..record()
        };
        let embed = section_embed(&query, &record, Utc::now());

        assert_eq!(value(&embed, "Day of Week"), "Fri");
    }

    #[test]
    fn lists_sections() {
        let other = SectionRecord {
            section: Some("B2".to_owned()),
            instructor: None,
            ..record()
        };
        let lines = section_lines(&[record(), other], MAX_CONTENT_LENGTH);

        assert_eq!(
            lines,
            "`A1` LEC - Hertz (3/180 open)\n`B2` LEC - [unknown] (3/180 open)"
        );
    }

    #[test]
    fn long_listings_stop_at_the_budget() {
        let sections: Vec<_> = (0..500)
            .map(|n| SectionRecord {
                section: Some(format!("S{n}")),
                ..record()
            })
            .collect();
        let lines = section_lines(&sections, MAX_CONTENT_LENGTH);

        assert!(lines.chars().count() <= MAX_CONTENT_LENGTH);
        let (listed, more) = lines.rsplit_once('\n').unwrap();
        let shown = listed.lines().count();
        assert_eq!(more, format!("...and {} more", 500 - shown));
        assert!(listed.starts_with("`S0` LEC - Hertz"));
    }

    #[test]
    fn tiny_budgets_only_count_sections() {
        let lines = section_lines(&[record(), record()], 10);
        assert_eq!(lines, "...and 2 more");
    }
}
