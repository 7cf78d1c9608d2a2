//! Prompt construction from an acquired profile.
//!
//! The raw upstream payload is large and noisy. [`ProfileInsights`] pulls out
//! the parts worth showing the model and renders them as markdown sections;
//! the trait scores and a bounded copy of the payload follow.

use crate::parse::truncate_chars;
use chrono::{Datelike, Utc};
use insight_core::ProfileSnapshot;
use serde::Serialize;
use serde_json::Value;

/// Fixed instruction framing the model's role and output contract.
pub const SYSTEM_PROMPT: &str = "You are a senior executive coach and behavioral psychologist who \
turns personality assessments (Big Five / OCEAN and DISC) into concrete guidance on how to work \
with and communicate with a person. Be specific and grounded in the supplied data. Never invent \
facts that the data does not support. Respond with a single JSON object and nothing else.";

const OUTPUT_CONTRACT: &str = r#"Return ONLY a JSON object with exactly these keys:
{
  "summary": "2-3 sentence professional summary of how this person thinks and works",
  "strengths": ["strength 1", "strength 2", "strength 3"],
  "weaknesses": ["blind spot 1", "blind spot 2", "blind spot 3"]
}
Give exactly three strengths and three weaknesses. Do not wrap the JSON in code fences."#;

/// Raw payload copy in the prompt is capped at this many characters.
const RAW_PAYLOAD_CHARS: usize = 6_000;

const POST_PREVIEW_CHARS: usize = 300;
const MAX_ROLES: usize = 3;
const MAX_EDUCATION: usize = 3;
const MAX_SKILLS: usize = 10;
const MAX_POSTS: usize = 2;
const MAX_ADVICE: usize = 3;

const OCEAN_DIMENSIONS: [(&str, &str); 5] = [
    ("openness", "Openness"),
    ("conscientiousness", "Conscientiousness"),
    ("extraversion", "Extraversion"),
    ("agreeableness", "Agreeableness"),
    ("emotional_stability", "Emotional Stability"),
];

const DISC_DIMENSIONS: [(&str, &str); 4] = [
    ("dominance", "Dominance"),
    ("influence", "Influence"),
    ("steadiness", "Steadiness"),
    ("calculativeness", "Calculativeness"),
];

/// One assessed dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub label: String,
    pub score: Option<f64>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Role {
    pub title: String,
    pub organization: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Archetype {
    pub name: String,
    pub group: Option<String>,
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub label: String,
    pub description: Option<String>,
}

/// Prompt-relevant facts extracted from a profile payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileInsights {
    pub name: Option<String>,
    pub location: Option<String>,
    pub headline: Option<String>,
    pub ocean: Vec<Assessment>,
    pub disc: Vec<Assessment>,
    pub archetype: Option<Archetype>,
    pub roles: Vec<Role>,
    pub total_experience_years: Option<f64>,
    /// `(degree, school)`
    pub education: Vec<(String, String)>,
    pub skills: Vec<String>,
    pub topics: Vec<Topic>,
    pub recent_posts: Vec<String>,
    pub descriptors: Vec<String>,
    pub what_to_say: Vec<String>,
    pub what_to_avoid: Vec<String>,
}

impl ProfileInsights {
    /// Extract insights, computing experience up to the current month.
    pub fn extract(payload: &Value) -> Self {
        let today = Utc::now().date_naive();
        Self::extract_as_of(payload, (today.year(), today.month()))
    }

    /// Extract insights with an explicit `(year, month)` for open-ended roles.
    pub fn extract_as_of(payload: &Value, today: (i32, u32)) -> Self {
        let personality = payload.get("personality_analysis");
        let work_history = payload
            .get("work_history")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let archetype = personality
            .and_then(|p| p.pointer("/summary/disc"))
            .and_then(|disc| {
                let name = text_at(disc, "archetype")?;
                Some(Archetype {
                    name,
                    group: text_at(disc, "group"),
                    traits: strings_at(disc.pointer("/description"), usize::MAX),
                })
            });

        let advice = payload.pointer("/persona/true/communication_advice");

        Self {
            name: text_at(payload, "display_name"),
            location: text_at(payload, "location"),
            headline: text_at(payload, "user_description"),
            ocean: assessments(personality.and_then(|p| p.get("ocean_assessment")), &OCEAN_DIMENSIONS),
            disc: assessments(personality.and_then(|p| p.get("disc_assessment")), &DISC_DIMENSIONS),
            archetype,
            roles: work_history.iter().filter_map(role).take(MAX_ROLES).collect(),
            total_experience_years: total_experience_years(work_history, today),
            education: payload
                .get("education")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|e| Some((text_at(e, "degree")?, text_at(e, "school")?)))
                        .take(MAX_EDUCATION)
                        .collect()
                })
                .unwrap_or_default(),
            skills: strings_at(payload.get("skills"), MAX_SKILLS),
            topics: payload
                .pointer("/external_signals/topics_they_care_about")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|t| {
                            Some(Topic {
                                label: text_at(t, "label")?,
                                description: text_at(t, "description"),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default(),
            recent_posts: payload
                .pointer("/social_activity/linkedin")
                .and_then(Value::as_array)
                .map(|posts| {
                    posts
                        .iter()
                        .filter_map(|p| text_at(p, "post_text"))
                        .take(MAX_POSTS)
                        .collect()
                })
                .unwrap_or_default(),
            descriptors: strings_at(advice.and_then(|a| a.get("adjectives")), MAX_ADVICE),
            what_to_say: strings_at(advice.and_then(|a| a.get("what_to_say")), MAX_ADVICE),
            what_to_avoid: strings_at(advice.and_then(|a| a.get("what_to_avoid")), MAX_ADVICE),
        }
    }

    pub fn current_role(&self) -> Option<&Role> {
        self.roles.first()
    }

    /// Render as markdown sections. Sections with no data are omitted,
    /// except identity which always renders.
    pub fn to_markdown(&self) -> String {
        let mut sections = Vec::new();

        sections.push(format!(
            "## IDENTITY\nName: {}\nLocation: {}\nHeadline: {}",
            self.name.as_deref().unwrap_or("N/A"),
            self.location.as_deref().unwrap_or("N/A"),
            self.headline.as_deref().unwrap_or("N/A"),
        ));

        let mut personality = Vec::new();
        if !self.ocean.is_empty() {
            personality.push(format!("### OCEAN Profile:\n{}", assessment_lines(&self.ocean)));
        }
        if !self.disc.is_empty() {
            personality.push(format!("### DISC Assessment:\n{}", assessment_lines(&self.disc)));
        }
        if let Some(archetype) = &self.archetype {
            let mut block = format!("### Archetype: {}", archetype.name);
            if let Some(group) = &archetype.group {
                block.push_str(&format!("\nGroup: {}", group));
            }
            if !archetype.traits.is_empty() {
                block.push_str(&format!("\nTraits: {}", archetype.traits.join(", ")));
            }
            personality.push(block);
        }
        if !personality.is_empty() {
            sections.push(format!("## PERSONALITY ASSESSMENT\n{}", personality.join("\n\n")));
        }

        let mut background = Vec::new();
        if let Some(current) = self.current_role() {
            background.push(format!("Current: {} at {}", current.title, current.organization));
        }
        if let Some(years) = self.total_experience_years {
            background.push(format!("Total Experience: {:.1} years", years));
        }
        if !self.roles.is_empty() {
            let lines: Vec<String> = self
                .roles
                .iter()
                .map(|r| {
                    format!(
                        "- {} at {} ({} to {})",
                        r.title,
                        r.organization,
                        r.start.as_deref().unwrap_or("N/A"),
                        r.end.as_deref().filter(|e| !e.is_empty()).unwrap_or("Present"),
                    )
                })
                .collect();
            background.push(format!("Recent Experience:\n{}", lines.join("\n")));
        }
        if !self.education.is_empty() {
            let lines: Vec<String> = self
                .education
                .iter()
                .map(|(degree, school)| format!("- {} from {}", degree, school))
                .collect();
            background.push(format!("Education:\n{}", lines.join("\n")));
        }
        if !self.skills.is_empty() {
            background.push(format!("Key Skills: {}", self.skills.join(", ")));
        }
        if !background.is_empty() {
            sections.push(format!("## PROFESSIONAL BACKGROUND\n{}", background.join("\n")));
        }

        if !self.topics.is_empty() {
            let lines: Vec<String> = self
                .topics
                .iter()
                .map(|t| match &t.description {
                    Some(d) => format!("- {}: {}", t.label, d),
                    None => format!("- {}", t.label),
                })
                .collect();
            sections.push(format!("## CURRENT INTERESTS & FOCUS AREAS\n{}", lines.join("\n")));
        }

        if !self.recent_posts.is_empty() {
            let lines: Vec<String> = self
                .recent_posts
                .iter()
                .enumerate()
                .map(|(i, post)| format!("Post {} Theme: {}", i + 1, preview(post)))
                .collect();
            sections.push(format!("## RECENT SOCIAL ACTIVITY\n{}", lines.join("\n")));
        }

        let mut style = Vec::new();
        if !self.descriptors.is_empty() {
            style.push(format!("Descriptors: {}", self.descriptors.join(", ")));
        }
        if !self.what_to_say.is_empty() {
            style.push(format!("Effective Approaches:\n{}", bullet_lines(&self.what_to_say)));
        }
        if !self.what_to_avoid.is_empty() {
            style.push(format!("Approaches to Avoid:\n{}", bullet_lines(&self.what_to_avoid)));
        }
        if !style.is_empty() {
            sections.push(format!("## COMMUNICATION STYLE INDICATORS\n{}", style.join("\n")));
        }

        sections.join("\n\n")
    }
}

/// Build the user turn for one profile snapshot.
///
/// Deterministic for a given snapshot and month.
pub fn build_user_prompt(snapshot: &ProfileSnapshot) -> String {
    build_user_prompt_with(snapshot, &ProfileInsights::extract(&snapshot.raw_payload))
}

fn build_user_prompt_with(snapshot: &ProfileSnapshot, insights: &ProfileInsights) -> String {
    let scores: Vec<String> = snapshot
        .trait_scores
        .iter()
        .map(|(dimension, value)| format!("- {}: {:.0}", dimension, value))
        .collect();
    let raw = serde_json::to_string(&snapshot.raw_payload).unwrap_or_default();

    format!(
        "Analyze the following professional profile.\n\n{}\n\n## TRAIT SCORES (0-100)\n{}\n\n## RAW PROFILE DATA\n{}\n\n{}",
        insights.to_markdown(),
        scores.join("\n"),
        truncate_chars(&raw, RAW_PAYLOAD_CHARS),
        OUTPUT_CONTRACT,
    )
}

// ============================================================================
// EXTRACTION HELPERS
// ============================================================================

fn text_at(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strings from an array, or from a single string value.
fn strings_at(value: Option<&Value>, limit: usize) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(limit)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn assessments(section: Option<&Value>, dimensions: &[(&str, &str)]) -> Vec<Assessment> {
    let Some(section) = section else {
        return Vec::new();
    };
    dimensions
        .iter()
        .filter_map(|(key, label)| {
            let entry = section.get(*key)?;
            let score = entry.get("score").and_then(Value::as_f64);
            let level = text_at(entry, "level");
            if score.is_none() && level.is_none() {
                return None;
            }
            Some(Assessment {
                label: (*label).to_string(),
                score,
                level,
            })
        })
        .collect()
}

fn role(entry: &Value) -> Option<Role> {
    Some(Role {
        title: text_at(entry, "title")?,
        organization: text_at(entry, "organization").unwrap_or_else(|| "N/A".to_string()),
        start: text_at(entry, "start_date"),
        end: text_at(entry, "end_date"),
    })
}

fn assessment_lines(items: &[Assessment]) -> String {
    items
        .iter()
        .map(|a| {
            let score = a
                .score
                .map(|s| format!("{:.0}", s))
                .unwrap_or_else(|| "N/A".to_string());
            match &a.level {
                Some(level) => format!("- {}: {} ({})", a.label, score, level),
                None => format!("- {}: {}", a.label, score),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_lines(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

fn preview(post: &str) -> String {
    let cut = truncate_chars(post, POST_PREVIEW_CHARS);
    if cut.len() < post.len() {
        format!("{}...", cut)
    } else {
        cut.to_string()
    }
}

// ============================================================================
// EXPERIENCE
// ============================================================================

/// Parse `MM-YYYY` or `YYYY-MM` into `(year, month)`.
pub fn parse_year_month(text: &str) -> Option<(i32, u32)> {
    let (left, right) = text.trim().split_once('-')?;
    let candidates = [(right, left), (left, right)];
    candidates.iter().find_map(|(year, month)| {
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return None;
        }
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        ((1..=12).contains(&month) && (1900..=2100).contains(&year)).then_some((year, month))
    })
}

/// Years from the earliest start to the latest end, one decimal.
///
/// A role without an end date counts as ongoing.
pub fn total_experience_years(work_history: &[Value], today: (i32, u32)) -> Option<f64> {
    let mut earliest: Option<(i32, u32)> = None;
    let mut latest: Option<(i32, u32)> = None;

    for entry in work_history {
        let Some(start) = entry
            .get("start_date")
            .and_then(Value::as_str)
            .and_then(parse_year_month)
        else {
            continue;
        };
        let end = match entry.get("end_date").and_then(Value::as_str).map(str::trim) {
            None | Some("") => Some(today),
            Some(text) => parse_year_month(text),
        };
        earliest = Some(earliest.map_or(start, |e| e.min(start)));
        if let Some(end) = end {
            latest = Some(latest.map_or(end, |l| l.max(end)));
        }
    }

    let (start, end) = (earliest?, latest?);
    let months = (end.0 - start.0) * 12 + end.1 as i32 - start.1 as i32;
    if months < 0 {
        return None;
    }
    Some((months as f64 / 12.0 * 10.0).round() / 10.0)
}
