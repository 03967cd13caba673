use std::{fmt, str::FromStr};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseQueryError {
    #[error("`{0}` doesn't look like a course code, try something like `CSE 116`")]
    Course(String),
    #[error("`{0}` doesn't look like a semester, try something like `fall 2024`")]
    Semester(String),
    #[error("`{0}` isn't a known career")]
    Career(String),
}

/// A subject and catalog number, e.g. `CSE 116`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseCode {
    subject: String,
    number: String,
}

impl CourseCode {
    pub fn id(&self) -> String {
        format!("{} {}", self.subject, self.number)
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.number)
    }
}

impl FromStr for CourseCode {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseQueryError::Course(s.to_owned());
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_uppercase();

        let split = compact
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(err)?;
        let (subject, number) = compact.split_at(split);

        if !(2..=5).contains(&subject.len()) || !subject.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(err());
        }

        let digits = number.chars().take_while(char::is_ascii_digit).count();
        let suffix = &number[digits..];
        if digits != 3 || suffix.len() > 2 || !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(err());
        }

        Ok(CourseCode {
            subject: subject.to_owned(),
            number: number.to_owned(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Term {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Term {
    pub const ALL: [Term; 4] = [Term::Spring, Term::Summer, Term::Fall, Term::Winter];

    pub fn id(&self) -> &'static str {
        match self {
            Term::Spring => "spring",
            Term::Summer => "summer",
            Term::Fall => "fall",
            Term::Winter => "winter",
        }
    }

    fn from_prefix(s: &str) -> Option<Term> {
        match s {
            "spring" | "spr" | "sp" | "s" => Some(Term::Spring),
            "summer" | "sum" | "su" => Some(Term::Summer),
            "fall" | "fa" | "f" | "autumn" => Some(Term::Fall),
            "winter" | "win" | "wi" | "w" => Some(Term::Winter),
            _ => None,
        }
    }
}

/// A term plus a four digit year, e.g. `fall2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semester {
    pub term: Term,
    pub year: u16,
}

impl Semester {
    pub fn id(&self) -> String {
        format!("{}{}", self.term.id(), self.year)
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let term = self.term.id();
        let mut chars = term.chars();
        match chars.next() {
            Some(first) => write!(
                f,
                "{}{} {}",
                first.to_ascii_uppercase(),
                chars.as_str(),
                self.year
            ),
            None => write!(f, "{}", self.year),
        }
    }
}

impl FromStr for Semester {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseQueryError::Semester(s.to_owned());
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_lowercase();

        let split = compact
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(err)?;
        let (term, year) = compact.split_at(split);

        let term = Term::from_prefix(term).ok_or_else(err)?;
        if !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let year = match year.len() {
            2 => 2000 + year.parse::<u16>().map_err(|_| err())?,
            4 => year.parse::<u16>().map_err(|_| err())?,
            _ => return Err(err()),
        };

        Ok(Semester { term, year })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Career {
    #[default]
    Undergraduate,
    Graduate,
    Law,
    Dental,
    Medicine,
}

impl Career {
    pub const ALL: [Career; 5] = [
        Career::Undergraduate,
        Career::Graduate,
        Career::Law,
        Career::Dental,
        Career::Medicine,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Career::Undergraduate => "UGRD",
            Career::Graduate => "GRAD",
            Career::Law => "LAW",
            Career::Dental => "SDM",
            Career::Medicine => "MED",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Career::Undergraduate => "undergraduate",
            Career::Graduate => "graduate",
            Career::Law => "law",
            Career::Dental => "dental",
            Career::Medicine => "medicine",
        }
    }
}

impl FromStr for Career {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Career::ALL
            .into_iter()
            .find(|career| career.name() == lowered || career.id().eq_ignore_ascii_case(&lowered))
            .or(match lowered.as_str() {
                "undergrad" | "ug" => Some(Career::Undergraduate),
                "grad" => Some(Career::Graduate),
                _ => None,
            })
            .ok_or_else(|| ParseQueryError::Career(s.to_owned()))
    }
}

/// Identifies one course offering in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub course: String,
    pub semester: String,
    pub career: String,
}

impl Query {
    pub fn new(course: &CourseCode, semester: &Semester, career: Career) -> Query {
        Query {
            course: course.id(),
            semester: semester.id(),
            career: career.id().to_owned(),
        }
    }

    /// Builds a query from ids as they are stored, without validation.
    #[cfg(test)]
    pub fn from_ids(course: String, semester: String, career: String) -> Query {
        Query {
            course,
            semester,
            career,
        }
    }
}

/// One section of a course as reported by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub class_id: Option<u32>,
    pub section: Option<String>,
    pub class_type: Option<String>,
    pub instructor: Option<String>,
    pub room: Option<String>,
    pub days_of_week: Option<Vec<String>>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_open: Option<bool>,
    pub open_seats: Option<u32>,
    pub total_seats: Option<u32>,
}

impl SectionRecord {
    pub fn is_section(&self, section: &str) -> bool {
        self.section
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(section.trim()))
    }
}
