//! Letter retrieval: turns what the store holds for an admission into the
//! message clinicians see, as plain text or JSON.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::enums::LetterOutcome;
use crate::models::{GeneratedLetter, LetterSection};

const SUPPORT_NOTE: &str =
    "Als dit toch onverwachts is, neem dan contact op met de afdeling Digital Health via ai-support@umcutrecht.nl";

/// Redactor placeholder that reads badly in a finished letter.
const AGE_PLACEHOLDER: &str = " [LEEFTIJD-1]-jarige";

/// What the store returned for one admission.
pub struct RetrievalInput<'a> {
    pub admission_id: &'a str,
    /// Pseudonymized patient id from the admission row, if known.
    pub patient_id: Option<&'a str>,
    /// The current letter, whatever its outcome.
    pub latest: Option<&'a GeneratedLetter>,
    pub latest_successful: Option<&'a GeneratedLetter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    Available,
    NotGenerated,
    NoSuccessfulLetter,
}

#[derive(Debug, Clone, Serialize)]
pub struct LetterResponse {
    pub admission_id: String,
    pub status: RetrievalStatus,
    pub message: String,
    pub letter_id: Option<Uuid>,
    pub patient_id: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub days_old: Option<i64>,
    pub sections: Vec<LetterSection>,
}

impl LetterResponse {
    pub fn is_available(&self) -> bool {
        self.status == RetrievalStatus::Available
    }
}

/// Build the response for an admission. Dates in the message are shown in
/// `tz`; the letter's age counts calendar days in that zone.
pub fn build_response<Tz>(input: &RetrievalInput<'_>, now: DateTime<Utc>, tz: &Tz) -> LetterResponse
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let latest_is_length_error = input
        .latest
        .is_some_and(|l| l.outcome == LetterOutcome::LengthError);

    let Some(letter) = input.latest_successful else {
        let (status, message) = match input.latest {
            None => (RetrievalStatus::NotGenerated, not_generated_message()),
            Some(_) => (
                RetrievalStatus::NoSuccessfulLetter,
                no_success_message(latest_is_length_error),
            ),
        };
        return LetterResponse {
            admission_id: input.admission_id.to_string(),
            status,
            message,
            letter_id: None,
            patient_id: input.patient_id.map(str::to_string),
            generated_at: None,
            days_old: None,
            sections: Vec::new(),
        };
    };

    let generated_local = letter.generated_at.with_timezone(tz);
    let days_old = (now.with_timezone(tz).date_naive() - generated_local.date_naive()).num_days();
    let patient_id = input.patient_id.unwrap_or("onbekend");

    let mut message = format!(
        "Deze brief is door AI gegenereerd voor patiëntnummer: {patient_id} op: {}\n\n",
        generated_local.format("%d-%m-%Y %H:%M")
    );
    if days_old > 0 {
        if days_old > 7 {
            message.push_str(&format!(
                "NB Let erop dat deze AI-brief meer dan een week geleden is gegenereerd, namelijk {days_old} dagen geleden.\n"
            ));
        } else {
            message.push_str(&format!(
                "NB Let erop dat deze AI-brief niet afgelopen nacht is gegenereerd, maar {days_old} dagen geleden.\n"
            ));
        }
        if latest_is_length_error {
            message.push_str("Dit komt doordat het patiëntendossier te lang is geworden voor het AI model.");
        }
    }
    message.push_str("\n\n");
    message.push_str(&render_sections(&letter.sections));

    LetterResponse {
        admission_id: input.admission_id.to_string(),
        status: RetrievalStatus::Available,
        message: remove_placeholders(&message),
        letter_id: Some(letter.id),
        patient_id: input.patient_id.map(str::to_string),
        generated_at: Some(letter.generated_at),
        days_old: Some(days_old),
        sections: letter
            .sections
            .iter()
            .map(|s| LetterSection {
                category: s.category.clone(),
                text: remove_placeholders(&s.text),
            })
            .collect(),
    }
}

/// `Category\ntext\n\n` per section, in stored (department) order.
pub fn render_sections(sections: &[LetterSection]) -> String {
    sections
        .iter()
        .map(|s| format!("{}\n{}\n\n", s.category, s.text))
        .collect()
}

fn remove_placeholders(text: &str) -> String {
    text.replace(AGE_PLACEHOLDER, "")
}

fn not_generated_message() -> String {
    format!(
        "Er is geen ontslagbrief in de database gevonden voor deze patiënt. \
         Dit komt voor bij patiënten in hun eerste 24 uur van de opname. \
         Indien de patiënt nog is opgenomen, zal morgen een AI-ontslagbrief worden gegenereerd.\n\n{SUPPORT_NOTE}"
    )
}

fn no_success_message(length_error: bool) -> String {
    let mut message =
        String::from("Er is geen succesvol gegenereerde ontslagbrief in de database gevonden voor deze patiënt. ");
    if length_error {
        message.push_str("Dit komt doordat het patiëntendossier te lang is geworden voor het AI model.\n\n");
    }
    message.push_str(SUPPORT_NOTE);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Environment;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, day, hour, 30, 0).unwrap()
    }

    fn success(day: u32) -> GeneratedLetter {
        let mut letter = GeneratedLetter::new("1001", "NICU", Environment::Prod, LetterOutcome::Success);
        letter.generated_at = at(day, 2);
        letter.sections = vec![
            LetterSection {
                category: "Respiratie".into(),
                text: "Een [LEEFTIJD-1]-jarige zuigeling, CPAP afgebouwd.".into(),
            },
            LetterSection {
                category: "Infectie".into(),
                text: "Bloedkweek negatief.".into(),
            },
        ];
        letter
    }

    fn failure(day: u32, outcome: LetterOutcome) -> GeneratedLetter {
        let mut letter = GeneratedLetter::new("1001", "NICU", Environment::Prod, outcome);
        letter.generated_at = at(day, 2);
        letter
    }

    fn input<'a>(latest: Option<&'a GeneratedLetter>, successful: Option<&'a GeneratedLetter>) -> RetrievalInput<'a> {
        RetrievalInput {
            admission_id: "1001",
            patient_id: Some("abc123"),
            latest,
            latest_successful: successful,
        }
    }

    #[test]
    fn fresh_letter_has_header_and_sections() {
        let letter = success(20);
        let response = build_response(&input(Some(&letter), Some(&letter)), at(20, 9), &Utc);

        assert!(response.is_available());
        assert_eq!(response.days_old, Some(0));
        assert_eq!(
            response.message,
            "Deze brief is door AI gegenereerd voor patiëntnummer: abc123 op: 20-04-2024 02:30\n\n\n\n\
             Respiratie\nEen zuigeling, CPAP afgebouwd.\n\nInfectie\nBloedkweek negatief.\n\n"
        );
        assert_eq!(response.sections[0].text, "Een zuigeling, CPAP afgebouwd.");
    }

    #[test]
    fn older_letters_carry_an_age_note() {
        let letter = success(18);
        let response = build_response(&input(Some(&letter), Some(&letter)), at(20, 9), &Utc);
        assert!(response.message.contains("niet afgelopen nacht is gegenereerd, maar 2 dagen geleden"));

        let letter = success(1);
        let response = build_response(&input(Some(&letter), Some(&letter)), at(20, 9), &Utc);
        assert!(response.message.contains("meer dan een week geleden is gegenereerd, namelijk 19 dagen geleden"));
    }

    #[test]
    fn stale_letter_after_length_error_says_why() {
        let letter = success(18);
        let latest = failure(20, LetterOutcome::LengthError);
        let response = build_response(&input(Some(&latest), Some(&letter)), at(20, 9), &Utc);
        assert!(response.is_available());
        assert!(response.message.contains("te lang is geworden"));
    }

    #[test]
    fn nothing_generated_yet() {
        let response = build_response(&input(None, None), at(20, 9), &Utc);
        assert_eq!(response.status, RetrievalStatus::NotGenerated);
        assert!(response.message.contains("eerste 24 uur"));
        assert!(response.letter_id.is_none());
    }

    #[test]
    fn only_failures_names_length_error() {
        let latest = failure(20, LetterOutcome::LengthError);
        let response = build_response(&input(Some(&latest), None), at(20, 9), &Utc);
        assert_eq!(response.status, RetrievalStatus::NoSuccessfulLetter);
        assert!(response.message.contains("te lang is geworden"));

        let latest = failure(20, LetterOutcome::ModelError);
        let response = build_response(&input(Some(&latest), None), at(20, 9), &Utc);
        assert!(!response.message.contains("te lang"));
    }
}
