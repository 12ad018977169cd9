//! Tools exposed to the language model.
//!
//! Tool handlers take the requesting user from [`RunContext`]. Model
//! arguments never decide whose relationships or photos are read.
//! Failures are returned to the model as `{"error": ...}` so it can
//! recover; they do not abort the run.
//!
//! `create_collage` and `create_memory` let the model turn search results
//! into a stored memory: find the photos, lay them out, then save.

use futures::future::try_join_all;
use image::ImageFormat;
use serde_json::{json, Map, Value};

use photos_blob::{BlobClient, BlobError, GcsUri};
use photos_collage::{
    compose, decode, encode, output_target, CollageError, ImageLocation, CELL_HEIGHT, CELL_WIDTH,
};
use photos_core::{NewMemory, RelationshipType};
use photos_graph::{bind, GraphClient, GraphError};

use crate::error::AgentError;
use crate::model::{FunctionCall, FunctionDeclaration};
use crate::pipeline::{extract_parameters, SearchOutcome, SearchPipeline};

pub const CREATE_COLLAGE: &str = "create_collage";
pub const CREATE_MEMORY: &str = "create_memory";
pub const EXECUTE_GRAPH_QUERY: &str = "execute_graph_query";
pub const FIND_RELATIONSHIPS_BY_TYPE: &str = "find_relationships_by_type";
pub const SEARCH_PHOTOS: &str = "search_photos";

/// Trusted per-request context.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub user_name: String,
    /// The request text after the identity statement.
    pub request: String,
}

/// Result of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Sent back to the model as the function response.
    pub response: Value,
    pub warnings: Vec<String>,
    /// Set when the call ran the staged search.
    pub search: Option<SearchOutcome>,
}

impl ToolOutput {
    fn ok(response: Value, warnings: Vec<String>) -> Self {
        Self {
            response,
            warnings,
            search: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self::ok(json!({ "error": message.into() }), Vec::new())
    }

    pub fn is_error(&self) -> bool {
        self.response.get("error").is_some()
    }
}

/// Prefix for collages written without an explicit output path.
const COLLAGE_PREFIX: &str = "collages";

/// Inputs and output of one `create_collage` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CollagePlan {
    pub inputs: Vec<GcsUri>,
    pub output: GcsUri,
    pub format: ImageFormat,
}

/// The agent's tool set over one graph client.
#[derive(Clone)]
pub struct ToolSet {
    graph: GraphClient,
    pipeline: SearchPipeline,
    blob: Option<BlobClient>,
}

impl ToolSet {
    pub fn new(graph: GraphClient, pipeline: SearchPipeline) -> Self {
        Self {
            graph,
            pipeline,
            blob: None,
        }
    }

    /// Storage client used by `create_collage`. Without one the tool
    /// answers with an error.
    pub fn with_blob(mut self, blob: BlobClient) -> Self {
        self.blob = Some(blob);
        self
    }

    /// JSON schema declarations handed to the model.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        vec![
            FunctionDeclaration {
                name: SEARCH_PHOTOS.to_string(),
                description: "Find the logged in user's photos by relationship, people, and \
                              location. Returns the matching photo locations."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "relationship_type": {
                            "type": "string",
                            "enum": ["FAMILY", "FRIEND", "PET"],
                            "description": "Relationship group to include."
                        },
                        "person_names": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "People named in the request."
                        },
                        "location": {
                            "type": "string",
                            "description": "Place name, e.g. Goa."
                        },
                        "include_self": {
                            "type": "boolean",
                            "description": "True when the request says me or I."
                        }
                    }
                }),
            },
            FunctionDeclaration {
                name: FIND_RELATIONSHIPS_BY_TYPE.to_string(),
                description: "List the names of people related to the logged in user."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "relationship_type": {
                            "type": "string",
                            "enum": ["FAMILY", "FRIEND", "PET"]
                        }
                    },
                    "required": ["relationship_type"]
                }),
            },
            FunctionDeclaration {
                name: EXECUTE_GRAPH_QUERY.to_string(),
                description: "Run one read-only SELECT ... FROM GRAPH query with named \
                              parameters. Returns rows as objects."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "params": {
                            "type": "object",
                            "description": "Parameter name to value."
                        },
                        "param_types": {
                            "type": "object",
                            "description": "Parameter name to STRING, INT64 or TIMESTAMP."
                        }
                    },
                    "required": ["query"]
                }),
            },
            FunctionDeclaration {
                name: CREATE_COLLAGE.to_string(),
                description: "Lay out photos on a near-square grid and store the result. \
                              Returns the collage location."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "image_paths": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "gs:// photo locations, in display order."
                        },
                        "output_path": {
                            "type": "string",
                            "description": "Optional gs:// location for the collage."
                        }
                    },
                    "required": ["image_paths"]
                }),
            },
            FunctionDeclaration {
                name: CREATE_MEMORY.to_string(),
                description: "Save a memory for the logged in user with a title, a \
                              description and gs:// media locations."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "memory_title": { "type": "string" },
                        "memory_description": { "type": "string" },
                        "memory_media": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "gs:// locations, e.g. a collage."
                        }
                    },
                    "required": ["memory_title"]
                }),
            },
        ]
    }

    /// Dispatch one model function call.
    pub async fn call(&self, ctx: &RunContext, call: &FunctionCall) -> ToolOutput {
        let result = match call.name.as_str() {
            SEARCH_PHOTOS => self.search_photos(ctx, &call.args).await,
            FIND_RELATIONSHIPS_BY_TYPE => self.find_relationships_by_type(ctx, &call.args).await,
            EXECUTE_GRAPH_QUERY => self.execute_graph_query(&call.args).await,
            CREATE_COLLAGE => self.create_collage(&call.args).await,
            CREATE_MEMORY => self.create_memory(ctx, &call.args).await,
            other => Ok(ToolOutput::error(format!("Unknown tool: {other}"))),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
            ToolOutput::error(tool_error_message(&e))
        })
    }

    async fn search_photos(&self, ctx: &RunContext, args: &Value) -> Result<ToolOutput, AgentError> {
        let params = extract_parameters(args, &ctx.request)?;
        let outcome = self.pipeline.run(&ctx.user_name, params).await?;
        let mut output = ToolOutput::ok(
            json!({ "photo_locations": outcome.photo_locations }),
            outcome.warnings.clone(),
        );
        output.search = Some(outcome);
        Ok(output)
    }

    async fn find_relationships_by_type(
        &self,
        ctx: &RunContext,
        args: &Value,
    ) -> Result<ToolOutput, AgentError> {
        let relationship = args
            .get("relationship_type")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ToolArguments {
                tool: FIND_RELATIONSHIPS_BY_TYPE.to_string(),
                message: "relationship_type is required".to_string(),
            })?
            .parse::<RelationshipType>()
            .map_err(|message| AgentError::ToolArguments {
                tool: FIND_RELATIONSHIPS_BY_TYPE.to_string(),
                message,
            })?;

        let fetched = self.graph.relationship_names(&ctx.user_name, relationship).await?;
        let rows: Vec<Value> = fetched
            .items
            .iter()
            .map(|name| json!({ "person_name": name }))
            .collect();
        Ok(ToolOutput::ok(Value::Array(rows), fetched.warnings))
    }

    async fn execute_graph_query(&self, args: &Value) -> Result<ToolOutput, AgentError> {
        let query = args.get("query").and_then(Value::as_str).ok_or_else(|| {
            AgentError::ToolArguments {
                tool: EXECUTE_GRAPH_QUERY.to_string(),
                message: "query is required".to_string(),
            }
        })?;
        let params = object_arg(args, "params")?;
        let types = object_arg(args, "param_types")?;

        let bound = bind(params, types)?;
        let outcome = self.graph.execute(query, &bound, None).await?;
        let rows: Vec<Value> = outcome.rows.into_iter().map(Value::Object).collect();
        Ok(ToolOutput::ok(Value::Array(rows), outcome.warnings))
    }

    async fn create_collage(&self, args: &Value) -> Result<ToolOutput, AgentError> {
        let plan = collage_plan(args)?;
        let blob = self.blob.as_ref().ok_or(BlobError::NotConfigured)?;

        let reads = plan.inputs.iter().map(|uri| async move {
            ImageLocation::Remote(uri.clone()).read(blob).await
        });
        let sources = try_join_all(reads).await?;

        let format = plan.format;
        let bytes = tokio::task::spawn_blocking(move || render_collage(&sources, format))
            .await
            .map_err(|e| AgentError::Collage(CollageError::Io(std::io::Error::other(e))))??;

        let output = ImageLocation::Remote(plan.output.clone());
        output.write(blob, bytes, plan.format).await?;
        tracing::info!(images = plan.inputs.len(), output = %plan.output, "Collage stored");

        Ok(ToolOutput::ok(
            json!({ "collage_location": plan.output.to_string() }),
            Vec::new(),
        ))
    }

    async fn create_memory(&self, ctx: &RunContext, args: &Value) -> Result<ToolOutput, AgentError> {
        let invalid = |message: &str| AgentError::ToolArguments {
            tool: CREATE_MEMORY.to_string(),
            message: message.to_string(),
        };
        let title = args
            .get("memory_title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| invalid("memory_title is required"))?;
        let description = args
            .get("memory_description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let media = string_list(args.get("memory_media"))
            .ok_or_else(|| invalid("memory_media must be a list of strings"))?;
        if let Some(bad) = media.iter().find(|m| GcsUri::parse(m).is_none()) {
            return Err(invalid(&format!("not a storage reference: {bad}")));
        }

        let fetched = self.graph.person_by_name(&ctx.user_name).await?;
        let warnings = fetched.warnings.clone();
        let user = fetched
            .first()
            .ok_or_else(|| AgentError::UnknownUser(ctx.user_name.clone()))?;

        let memory = self
            .graph
            .insert_memory(NewMemory {
                user_id: user.person_id,
                memory_title: title.to_string(),
                memory_description: description.to_string(),
                memory_media: media,
            })
            .await?;

        Ok(ToolOutput::ok(
            json!({
                "memory_id": memory.memory_id.to_string(),
                "memory_media": memory.memory_media,
            }),
            warnings,
        ))
    }
}

/// Validate `create_collage` arguments.
///
/// Only `gs://` references are accepted. Without `output_path` the collage
/// goes to `gs://<first input bucket>/collages/<uuid>.jpg`.
pub fn collage_plan(args: &Value) -> Result<CollagePlan, AgentError> {
    let invalid = |message: String| AgentError::ToolArguments {
        tool: CREATE_COLLAGE.to_string(),
        message,
    };
    let paths = string_list(args.get("image_paths"))
        .filter(|paths| !paths.is_empty())
        .ok_or_else(|| invalid("image_paths must be a non-empty list of strings".to_string()))?;
    let inputs = paths
        .iter()
        .map(|p| GcsUri::parse(p).ok_or_else(|| invalid(format!("not a storage reference: {p}"))))
        .collect::<Result<Vec<_>, _>>()?;

    let requested = match args.get("output_path").and_then(Value::as_str).map(str::trim) {
        Some(path) if !path.is_empty() => path.to_string(),
        _ => format!(
            "gs://{}/{COLLAGE_PREFIX}/{}",
            inputs[0].bucket,
            uuid::Uuid::new_v4()
        ),
    };
    let (name, format) = output_target(&requested)?;
    let output = GcsUri::parse(&name).ok_or_else(|| invalid(format!("not a storage reference: {name}")))?;

    Ok(CollagePlan {
        inputs,
        output,
        format,
    })
}

/// Decode, lay out and encode a collage. CPU bound.
pub fn render_collage(sources: &[Vec<u8>], format: ImageFormat) -> Result<Vec<u8>, AgentError> {
    let images = sources
        .iter()
        .map(|bytes| decode(bytes))
        .collect::<photos_collage::Result<Vec<_>>>()?;
    let canvas = compose(&images, CELL_WIDTH, CELL_HEIGHT)?;
    Ok(encode(&canvas, format)?)
}

/// A list of strings; a lone string counts as a one-element list and a
/// missing value as empty.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::String(s)) => Some(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(_) => None,
    }
}

fn object_arg<'a>(args: &'a Value, key: &str) -> Result<Option<&'a Map<String, Value>>, AgentError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(AgentError::ToolArguments {
            tool: EXECUTE_GRAPH_QUERY.to_string(),
            message: format!("{key} must be an object"),
        }),
    }
}

/// Message returned to the model. Never includes query text.
fn tool_error_message(e: &AgentError) -> String {
    match e {
        AgentError::Graph(GraphError::QueryRejected { .. }) => {
            "Invalid query. Only SELECT statements are allowed.".to_string()
        }
        AgentError::Graph(GraphError::Store(_)) => {
            "An error occurred while executing the query.".to_string()
        }
        AgentError::Storage(BlobError::NotConfigured) => {
            "Photo storage is not available.".to_string()
        }
        AgentError::Storage(_) | AgentError::Collage(CollageError::Blob(_)) => {
            "Could not read or write photo storage.".to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::GroupPolicy;
    use photos_graph::store::{ResultSet, StoreErrorKind};
    use photos_graph::testing::ScriptedStore;
    use std::sync::Arc;

    fn tools(store: &Arc<ScriptedStore>) -> ToolSet {
        let graph = GraphClient::new(store.clone(), "PhotosGraph");
        let pipeline = SearchPipeline::new(graph.clone(), GroupPolicy::default());
        ToolSet::new(graph, pipeline)
    }

    fn ctx() -> RunContext {
        RunContext {
            user_name: "Rohan".to_string(),
            request: "Show me photos of my friends".to_string(),
        }
    }

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn test_declarations() {
        let store = Arc::new(ScriptedStore::new());
        let names: Vec<String> = tools(&store)
            .declarations()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            [
                SEARCH_PHOTOS,
                FIND_RELATIONSHIPS_BY_TYPE,
                EXECUTE_GRAPH_QUERY,
                CREATE_COLLAGE,
                CREATE_MEMORY
            ]
        );
    }

    #[tokio::test]
    async fn relationships_use_context_user() {
        let store = Arc::new(ScriptedStore::new().on(
            "RelationShip",
            ResultSet {
                fields: None,
                rows: vec![vec![json!("Anjali")], vec![json!("Sameer")]],
            },
        ));

        let output = tools(&store)
            .call(
                &ctx(),
                &call(
                    FIND_RELATIONSHIPS_BY_TYPE,
                    json!({"relationship_type": "friends", "user_name": "Priya"}),
                ),
            )
            .await;

        assert_eq!(
            output.response,
            json!([{"person_name": "Anjali"}, {"person_name": "Sameer"}])
        );
        assert_eq!(store.queries()[0].params.values()["user_name"], json!("Rohan"));
    }

    #[tokio::test]
    async fn rejected_query_is_reported_without_sql() {
        let store = Arc::new(ScriptedStore::new());
        let output = tools(&store)
            .call(
                &ctx(),
                &call(EXECUTE_GRAPH_QUERY, json!({"query": "DELETE FROM Person"})),
            )
            .await;

        assert!(output.is_error());
        let message = output.response["error"].as_str().unwrap();
        assert!(!message.contains("DELETE"));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn unknown_type_tag_fails_before_store() {
        let store = Arc::new(ScriptedStore::new());
        let output = tools(&store)
            .call(
                &ctx(),
                &call(
                    EXECUTE_GRAPH_QUERY,
                    json!({
                        "query": "SELECT p.name FROM GRAPH PhotosGraph MATCH (p:Person) WHERE p.name = @n",
                        "params": {"n": "Priya"},
                        "param_types": {"n": "BYTES"}
                    }),
                ),
            )
            .await;

        assert!(output.is_error());
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn graph_query_returns_rows() {
        let store = Arc::new(ScriptedStore::new().on(
            "MATCH",
            ResultSet {
                fields: Some(vec!["name".to_string()]),
                rows: vec![vec![json!("Priya")]],
            },
        ));
        let output = tools(&store)
            .call(
                &ctx(),
                &call(
                    EXECUTE_GRAPH_QUERY,
                    json!({
                        "query": "SELECT p.name FROM GRAPH PhotosGraph MATCH (p:Person) WHERE p.name = @n",
                        "params": {"n": "Priya"},
                        "param_types": {"n": "STRING"}
                    }),
                ),
            )
            .await;

        assert_eq!(output.response, json!([{"name": "Priya"}]));
        assert_eq!(store.queries()[0].params.values()["n"], json!("Priya"));
    }

    #[tokio::test]
    async fn search_photos_runs_pipeline() {
        let store = Arc::new(ScriptedStore::new().on(
            "AppearsIn",
            ResultSet {
                fields: None,
                rows: vec![vec![
                    json!("ph04"),
                    json!("2018-02-18T16:45:00Z"),
                    json!("College Campus"),
                    json!("gs://my-photos-bucket/ph04.jpg"),
                ]],
            },
        ));
        let output = tools(&store)
            .call(&ctx(), &call(SEARCH_PHOTOS, json!({"person_names": ["Anjali"]})))
            .await;

        assert_eq!(
            output.response,
            json!({"photo_locations": ["gs://my-photos-bucket/ph04.jpg"]})
        );
        let search = output.search.unwrap();
        assert_eq!(search.names, ["Anjali", "Rohan"]);
    }

    #[tokio::test]
    async fn degraded_store_surfaces_warning() {
        let store = Arc::new(ScriptedStore::new().fail(
            "RelationShip",
            StoreErrorKind::PermissionDenied,
            "denied",
        ));
        let output = tools(&store)
            .call(
                &ctx(),
                &call(FIND_RELATIONSHIPS_BY_TYPE, json!({"relationship_type": "FAMILY"})),
            )
            .await;
        assert_eq!(output.response, json!([]));
        assert_eq!(output.warnings.len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_response() {
        let store = Arc::new(ScriptedStore::new());
        let output = tools(&store).call(&ctx(), &call("drop_tables", json!({}))).await;
        assert!(output.is_error());
    }

    fn person_row() -> ResultSet {
        ResultSet {
            fields: None,
            rows: vec![vec![json!("p01"), json!("Rohan"), json!(null)]],
        }
    }

    #[tokio::test]
    async fn create_memory_saves_for_context_user() {
        let store = Arc::new(ScriptedStore::new().on("FROM Person", person_row()));
        let output = tools(&store)
            .call(
                &ctx(),
                &call(
                    CREATE_MEMORY,
                    json!({
                        "memory_title": "Goa trip",
                        "memory_description": "Beach days",
                        "memory_media": ["gs://my-photos-bucket/collages/goa.jpg"],
                        "user_id": "p02"
                    }),
                ),
            )
            .await;

        assert!(!output.is_error(), "{}", output.response);
        assert_eq!(
            output.response["memory_media"],
            json!(["gs://my-photos-bucket/collages/goa.jpg"])
        );
        assert_eq!(store.queries()[0].params.values()["person_name"], json!("Rohan"));

        let inserts = store.inserts();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].table, "Memories");
        let row = &inserts[0].rows[0];
        assert_eq!(row[1], json!("p01"));
        assert_eq!(row[2], json!("Goa trip"));
    }

    #[tokio::test]
    async fn create_memory_needs_a_known_user() {
        let store = Arc::new(ScriptedStore::new());
        let output = tools(&store)
            .call(&ctx(), &call(CREATE_MEMORY, json!({"memory_title": "Goa trip"})))
            .await;

        assert!(output.is_error());
        assert!(store.inserts().is_empty());
    }

    #[tokio::test]
    async fn create_memory_rejects_non_storage_media() {
        let store = Arc::new(ScriptedStore::new().on("FROM Person", person_row()));
        let output = tools(&store)
            .call(
                &ctx(),
                &call(
                    CREATE_MEMORY,
                    json!({"memory_title": "Goa", "memory_media": ["/etc/passwd"]}),
                ),
            )
            .await;

        assert!(output.is_error());
        assert!(store.executed().is_empty());
        assert!(store.inserts().is_empty());
    }

    #[test]
    fn collage_plan_defaults_output_next_to_inputs() {
        let plan = collage_plan(&json!({
            "image_paths": ["gs://my-photos-bucket/ph01.jpg", "gs://other/ph02.jpg"]
        }))
        .unwrap();

        assert_eq!(plan.inputs.len(), 2);
        assert_eq!(plan.output.bucket, "my-photos-bucket");
        assert!(plan.output.key.starts_with("collages/"));
        assert!(plan.output.key.ends_with(".jpg"));
        assert_eq!(plan.format, ImageFormat::Jpeg);

        let plan = collage_plan(&json!({
            "image_paths": "gs://my-photos-bucket/ph01.jpg",
            "output_path": "gs://my-photos-bucket/out/goa.png"
        }))
        .unwrap();
        assert_eq!(plan.output.to_string(), "gs://my-photos-bucket/out/goa.png");
        assert_eq!(plan.format, ImageFormat::Png);
    }

    #[test]
    fn collage_plan_rejects_local_paths() {
        assert!(collage_plan(&json!({"image_paths": []})).is_err());
        assert!(collage_plan(&json!({"image_paths": ["/tmp/a.jpg"]})).is_err());
        assert!(collage_plan(&json!({
            "image_paths": ["gs://b/a.jpg"],
            "output_path": "collage.jpg"
        }))
        .is_err());
    }

    #[test]
    fn render_collage_encodes_grid() {
        let png = |color: [u8; 3]| {
            let canvas = image::RgbImage::from_pixel(30, 20, image::Rgb(color));
            encode(&canvas, ImageFormat::Png).unwrap()
        };
        let bytes = render_collage(&[png([255, 0, 0]), png([0, 0, 255])], ImageFormat::Jpeg).unwrap();

        let collage = decode(&bytes).unwrap();
        assert_eq!((collage.width(), collage.height()), (2 * CELL_WIDTH, CELL_HEIGHT));
    }

    #[tokio::test]
    async fn create_collage_without_storage_is_an_error_response() {
        let store = Arc::new(ScriptedStore::new());
        let output = tools(&store)
            .call(
                &ctx(),
                &call(CREATE_COLLAGE, json!({"image_paths": ["gs://my-photos-bucket/ph01.jpg"]})),
            )
            .await;

        assert_eq!(output.response, json!({"error": "Photo storage is not available."}));
    }
}
