//! Mock provider directory
//!
//! Serves a fixed provider roster and synthesizes appointment slots. Stands
//! in for the practice-management system during development; the ranking
//! behavior (insurance filtering, complaint match score) is real and is
//! what the scheduling handler depends on.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use rand::Rng;

use intake_agent_core::{AppointmentSlot, Provider, ProviderDirectory, Result};

const URGENT_KEYWORDS: &[&str] = &["urgent", "immediate", "today", "asap", "emergency", "severe"];
const CHRONIC_KEYWORDS: &[&str] = &["diabetes", "hypertension", "chronic", "ongoing", "management"];
const ROUTINE_KEYWORDS: &[&str] = &["checkup", "physical", "routine", "annual", "prevention"];

pub struct MockProviderDirectory {
    providers: Vec<Provider>,
}

impl Default for MockProviderDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProviderDirectory {
    pub fn new() -> Self {
        Self {
            providers: vec![
                Provider {
                    id: "dr_smith_001".into(),
                    name: "Sarah Smith".into(),
                    specialty: "Family Medicine".into(),
                    accepted_payers: vec![
                        "Aetna".into(),
                        "Blue Cross".into(),
                        "United".into(),
                        "Medicare".into(),
                    ],
                    rating: 4.8,
                },
                Provider {
                    id: "dr_johnson_002".into(),
                    name: "Michael Johnson".into(),
                    specialty: "Internal Medicine".into(),
                    accepted_payers: vec![
                        "Blue Cross".into(),
                        "Cigna".into(),
                        "Humana".into(),
                        "United".into(),
                    ],
                    rating: 4.6,
                },
                Provider {
                    id: "dr_patel_003".into(),
                    name: "Priya Patel".into(),
                    specialty: "Family Medicine".into(),
                    accepted_payers: vec![
                        "Aetna".into(),
                        "Cigna".into(),
                        "Kaiser".into(),
                        "Medicare".into(),
                    ],
                    rating: 4.9,
                },
                Provider {
                    id: "dr_garcia_004_urgent".into(),
                    name: "Carlos Garcia".into(),
                    specialty: "Urgent Care".into(),
                    accepted_payers: vec![],
                    rating: 4.5,
                },
                Provider {
                    id: "dr_wong_005".into(),
                    name: "Jennifer Wong".into(),
                    specialty: "Internal Medicine".into(),
                    accepted_payers: vec![
                        "Blue Cross".into(),
                        "Kaiser".into(),
                        "United".into(),
                        "Medicaid".into(),
                    ],
                    rating: 4.7,
                },
            ],
        }
    }

    /// Complaint fit on top of the base rating. Only the relative ordering
    /// matters.
    fn match_score(provider: &Provider, complaint: Option<&str>) -> f32 {
        let Some(complaint) = complaint else {
            return provider.rating;
        };
        let complaint = complaint.to_lowercase();
        let mut score = provider.rating;

        if URGENT_KEYWORDS.iter().any(|k| complaint.contains(k)) {
            match provider.specialty.as_str() {
                "Urgent Care" => score += 2.0,
                "Family Medicine" => score += 1.0,
                _ => {}
            }
        }
        if CHRONIC_KEYWORDS.iter().any(|k| complaint.contains(k)) {
            match provider.specialty.as_str() {
                "Internal Medicine" => score += 1.5,
                "Family Medicine" => score += 1.0,
                _ => {}
            }
        }
        if ROUTINE_KEYWORDS.iter().any(|k| complaint.contains(k)) {
            if provider.specialty == "Family Medicine" {
                score += 1.5;
            }
        }
        score
    }

    fn accepts_payer(provider: &Provider, payer: Option<&str>) -> bool {
        let Some(payer) = payer else { return true };
        if provider.accepted_payers.is_empty() {
            return true;
        }
        let payer = payer.to_lowercase();
        provider.accepted_payers.iter().any(|accepted| {
            let accepted = accepted.to_lowercase();
            payer.contains(&accepted) || accepted.contains(&payer)
        })
    }

    fn slot_display(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> (String, Vec<String>) {
        let days_ahead = (starts_at.date_naive() - now.date_naive()).num_days();
        let day_name = starts_at.format("%A").to_string().to_lowercase();
        let day_str = match days_ahead {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            _ => starts_at.format("%A").to_string(),
        };

        let hour12 = match starts_at.hour() % 12 {
            0 => 12,
            h => h,
        };
        let meridiem = if starts_at.hour() < 12 { "AM" } else { "PM" };
        let time_str = format!("{}:{:02} {}", hour12, starts_at.minute(), meridiem);

        let display = if days_ahead <= 1 {
            format!("{day_str} at {time_str}")
        } else {
            format!("{day_str}, {} at {time_str}", starts_at.format("%B %-d"))
        };

        let keywords = vec![
            day_str.to_lowercase(),
            day_name,
            if starts_at.hour() < 12 {
                "morning".to_string()
            } else {
                "afternoon".to_string()
            },
        ];
        (display, keywords)
    }

    /// Generate slots for the next week. Weekends are skipped except for
    /// urgent-care providers, which also get same-day openings.
    fn generate_slots(provider_id: &str, now: DateTime<Utc>) -> Vec<AppointmentSlot> {
        let mut rng = rand::thread_rng();
        let mut slots = Vec::new();
        let urgent = provider_id.contains("urgent");

        for days_ahead in 1..8 {
            let date = now + Duration::days(days_ahead);
            if date.weekday().number_from_monday() >= 6 && !urgent {
                continue;
            }

            for (hours, chance) in [([9u32, 10, 11].as_slice(), 0.7), ([14u32, 15, 16].as_slice(), 0.6)] {
                for &hour in hours {
                    for minute in [0u32, 30] {
                        if rng.gen::<f64>() >= chance {
                            continue;
                        }
                        if let Some(starts_at) = date
                            .date_naive()
                            .and_hms_opt(hour, minute, 0)
                            .map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc))
                        {
                            let (display, keywords) = Self::slot_display(starts_at, now);
                            slots.push(AppointmentSlot {
                                starts_at,
                                display,
                                keywords,
                            });
                        }
                    }
                }
            }
        }

        if urgent {
            for hour in (now.hour() + 1)..18 {
                if rng.gen::<f64>() >= 0.5 {
                    continue;
                }
                if let Some(starts_at) = now
                    .date_naive()
                    .and_hms_opt(hour, 0, 0)
                    .map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc))
                {
                    let (display, keywords) = Self::slot_display(starts_at, now);
                    slots.push(AppointmentSlot {
                        starts_at,
                        display,
                        keywords,
                    });
                }
            }
        }

        slots.truncate(10);
        slots
    }
}

#[async_trait]
impl ProviderDirectory for MockProviderDirectory {
    async fn list_providers(
        &self,
        chief_complaint: Option<&str>,
        payer_name: Option<&str>,
    ) -> Result<Vec<Provider>> {
        let mut ranked: Vec<(f32, Provider)> = self
            .providers
            .iter()
            .filter(|p| Self::accepts_payer(p, payer_name))
            .map(|p| (Self::match_score(p, chief_complaint), p.clone()))
            .collect();

        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.1.rating
                        .partial_cmp(&a.1.rating)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        Ok(ranked.into_iter().map(|(_, p)| p).take(5).collect())
    }

    async fn list_slots(&self, provider_id: &str) -> Result<Vec<AppointmentSlot>> {
        Ok(Self::generate_slots(provider_id, Utc::now()))
    }
}
