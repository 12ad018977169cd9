//! Staged photo search.
//!
//! A request runs through named stages, each a function over the previous
//! stage's output:
//!
//! ```text
//! ExtractParameters -> ResolveRelationship -> AssembleNameList
//!     -> ChooseTool -> Execute -> Format
//! ```
//!
//! Only `ResolveRelationship` and `Execute` touch the graph, so the policy
//! in between is testable without a store or a model.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use photos_core::{Photo, RelationshipType};
use photos_graph::queries::NAME_DELIMITER;
use photos_graph::{GraphClient, PhotoSearch};

use crate::error::{AgentError, Result};
use crate::policy::GroupPolicy;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    ExtractParameters,
    ResolveRelationship,
    AssembleNameList,
    ChooseTool,
    Execute,
    Format,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the request asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub relationship_type: Option<RelationshipType>,
    /// People named explicitly in the request.
    pub person_names: Vec<String>,
    pub location: Option<String>,
    /// Whether the logged-in user asked to be in the photos ("me", "I").
    pub include_self: bool,
}

/// The single photo query a request ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoTool {
    PhotosByPeopleAndLocation,
    PhotosByPeople,
    PhotosByLocation,
}

/// One stage's output, kept for events and transcripts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub detail: String,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Final name list, in the order it was bound.
    pub names: Vec<String>,
    pub tool: Option<PhotoTool>,
    pub min_matches: usize,
    /// Ordered, de-duplicated storage references.
    pub photo_locations: Vec<String>,
    pub warnings: Vec<String>,
    pub stages: Vec<StageRecord>,
}

// ── Stage: ExtractParameters ─────────────────────────────────────

/// Whether the request asks for the user to be in the photos.
pub fn mentions_self(request: &str) -> bool {
    request
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|word| matches!(word.to_lowercase().as_str(), "me" | "i" | "myself" | "us" | "we"))
}

/// Build [`SearchParameters`] from model-supplied tool arguments.
///
/// `person_names` may be a delimited string or an array. When
/// `include_self` is absent it is inferred from the request text.
pub fn extract_parameters(args: &Value, request: &str) -> Result<SearchParameters> {
    let invalid = |message: String| AgentError::ToolArguments {
        tool: "search_photos".to_string(),
        message,
    };

    let relationship_type = match args.get("relationship_type") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.parse::<RelationshipType>().map_err(invalid)?),
        Some(_) => return Err(invalid("relationship_type must be a string".to_string())),
    };

    let person_names = match args.get("person_names") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(NAME_DELIMITER).map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("person_names must contain strings".to_string()))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(invalid("person_names must be a string or list".to_string())),
    };

    let location = match args.get("location") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().trim_matches('%').trim().to_string())
            .filter(|s| !s.is_empty()),
        Some(_) => return Err(invalid("location must be a string".to_string())),
    };

    let include_self = match args.get("include_self") {
        Some(Value::Bool(b)) => *b,
        _ => mentions_self(request),
    };

    Ok(SearchParameters {
        relationship_type,
        person_names: clean_names(person_names),
        location,
        include_self,
    })
}

// ── Stage: AssembleNameList ──────────────────────────────────────

fn clean_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.replace(NAME_DELIMITER, " ").trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Related names, then explicit names, then the user when requested.
/// Duplicates are dropped case-insensitively, keeping the first spelling.
pub fn assemble_names(
    related: &[String],
    explicit: &[String],
    user_name: &str,
    include_self: bool,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let candidates = related
        .iter()
        .chain(explicit)
        .map(String::as_str)
        .chain(include_self.then_some(user_name));

    let mut names = Vec::new();
    for name in clean_names(candidates.map(str::to_string).collect()) {
        if seen.insert(name.to_lowercase()) {
            names.push(name);
        }
    }
    names
}

/// The delimited form bound to `@person_names`.
pub fn join_names(names: &[String]) -> String {
    names.join(&NAME_DELIMITER.to_string())
}

// ── Stage: ChooseTool ────────────────────────────────────────────

/// Pick the most specific photo query. `None` means there is nothing to
/// search for and the answer is empty.
pub fn choose_tool(names: &[String], location: Option<&str>) -> Option<PhotoTool> {
    match (names.is_empty(), location.is_some()) {
        (false, true) => Some(PhotoTool::PhotosByPeopleAndLocation),
        (false, false) => Some(PhotoTool::PhotosByPeople),
        (true, true) => Some(PhotoTool::PhotosByLocation),
        (true, false) => None,
    }
}

// ── Stage: Format ────────────────────────────────────────────────

/// Storage references of `photos`, in order, without duplicates.
pub fn format_locations(photos: &[Photo]) -> Vec<String> {
    dedup_ordered(photos.iter().filter_map(|p| p.photo_location.clone()))
}

pub(crate) fn dedup_ordered(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

// ── Pipeline ─────────────────────────────────────────────────────

/// Runs the staged search against the graph.
#[derive(Clone)]
pub struct SearchPipeline {
    graph: GraphClient,
    policy: GroupPolicy,
}

impl SearchPipeline {
    pub fn new(graph: GraphClient, policy: GroupPolicy) -> Self {
        Self { graph, policy }
    }

    pub fn policy(&self) -> &GroupPolicy {
        &self.policy
    }

    /// Run every stage after extraction for `user_name`.
    pub async fn run(&self, user_name: &str, params: SearchParameters) -> Result<SearchOutcome> {
        let mut outcome = SearchOutcome::default();
        outcome.record(
            Stage::ExtractParameters,
            format!(
                "relationship={:?} names={:?} location={:?} include_self={}",
                params.relationship_type.map(|r| r.as_str()),
                params.person_names,
                params.location,
                params.include_self
            ),
        );

        // ResolveRelationship
        let related = match params.relationship_type {
            Some(relationship) => {
                let fetched = self.graph.relationship_names(user_name, relationship).await?;
                outcome.warnings.extend(fetched.warnings);
                outcome.record(
                    Stage::ResolveRelationship,
                    format!("{relationship} -> {:?}", fetched.items),
                );
                fetched.items
            }
            None => Vec::new(),
        };

        // A relationship with nobody in it, and nobody else named, matches
        // no photos. Falling through to a location-only search would widen
        // the request.
        if params.relationship_type.is_some()
            && related.is_empty()
            && params.person_names.is_empty()
        {
            outcome.record(Stage::ChooseTool, "no related people, nothing to search".to_string());
            outcome.record(Stage::Format, "[]".to_string());
            return Ok(outcome);
        }

        // AssembleNameList
        outcome.names = assemble_names(
            &related,
            &params.person_names,
            user_name,
            params.include_self,
        );
        outcome.record(Stage::AssembleNameList, join_names(&outcome.names));

        // ChooseTool
        outcome.tool = choose_tool(&outcome.names, params.location.as_deref());
        let Some(tool) = outcome.tool else {
            outcome.record(Stage::ChooseTool, "no people or location, nothing to search".to_string());
            outcome.record(Stage::Format, "[]".to_string());
            return Ok(outcome);
        };
        outcome.min_matches = self.policy.min_matches(outcome.names.len());
        outcome.record(
            Stage::ChooseTool,
            format!("{tool:?} min_matches={}", outcome.min_matches),
        );

        // Execute
        let search = PhotoSearch {
            person_names: outcome.names.clone(),
            location: params.location.clone(),
            min_matches: outcome.min_matches,
        };
        let fetched = self.graph.photos_with_people(&search).await?;
        outcome.warnings.extend(fetched.warnings);
        outcome.record(Stage::Execute, format!("{} photos", fetched.items.len()));

        // Format
        outcome.photo_locations = format_locations(&fetched.items);
        outcome.record(Stage::Format, format!("{} locations", outcome.photo_locations.len()));

        tracing::info!(
            user = user_name,
            tool = ?tool,
            names = outcome.names.len(),
            photos = outcome.photo_locations.len(),
            "Photo search complete"
        );
        Ok(outcome)
    }
}

impl SearchOutcome {
    fn record(&mut self, stage: Stage, detail: String) {
        tracing::debug!(%stage, %detail, "Pipeline stage");
        self.stages.push(StageRecord { stage, detail });
    }
}
