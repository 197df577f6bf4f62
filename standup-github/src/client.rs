use crate::error::{GithubError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
const GITHUB_USER_AGENT: &str = "standup-bot";
const GITHUB_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const LOGIN_QUERY: &str = "\
query {
  viewer {
    login
  }
}";

const VIEWER_PROJECTS_QUERY: &str = "\
query ($first: Int!, $after: String) {
  viewer {
    projectsV2(first: $first, after: $after) {
      edges {
        cursor
        node {
          id
          title
          number
          url
          creator {
            login
            url
          }
        }
      }
    }
  }
}";

const PROJECT_BY_ID_QUERY: &str = "\
query ($id: ID!) {
  node(id: $id) {
    ... on ProjectV2 {
      id
      title
      number
      url
      creator {
        login
        url
      }
    }
  }
}";

const PROJECT_ITEMS_QUERY: &str = "\
query ($id: ID!, $first: Int!, $after: String) {
  node(id: $id) {
    ... on ProjectV2 {
      items(first: $first, after: $after) {
        nodes {
          status: fieldValueByName(name: \"Status\") {
            ... on ProjectV2ItemFieldSingleSelectValue {
              name
            }
          }
          assignedTo: fieldValueByName(name: \"Assignees\") {
            ... on ProjectV2ItemFieldUserValue {
              users(first: 30) {
                nodes {
                  isViewer
                }
              }
            }
          }
          content {
            ... on DraftIssue {
              title
            }
            ... on Issue {
              title
            }
            ... on PullRequest {
              title
            }
          }
        }
      }
    }
  }
}";

/// Opaque GraphQL node id of a ProjectV2 board.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pagination cursor into the viewer's project list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ProjectCursor(pub String);

impl fmt::Display for ProjectCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub number: i64,
    pub url: String,
    pub creator_login: String,
    pub creator_url: String,
    /// Empty when the project was fetched by id rather than listed.
    pub cursor: Option<ProjectCursor>,
}

/// Item titles keyed by the name of their "Status" single-select column.
pub type ItemsByStatus = HashMap<String, Vec<String>>;

/// GitHub GraphQL client authenticated with a user-provided token.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    token: String,
}

impl Client {
    pub fn new(token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(GITHUB_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            token: token.to_string(),
        })
    }

    /// The login of the user the token belongs to. Doubles as token
    /// validation: a bad token fails here before anything is stored.
    pub async fn login(&self) -> Result<String> {
        let data: LoginData = self.execute(LOGIN_QUERY, json!({})).await?;

        Ok(data.viewer.login)
    }

    /// Lists up to `first` of the viewer's ProjectV2 boards, optionally
    /// starting after a cursor from a previous page.
    pub async fn list_viewer_projects(
        &self,
        first: u32,
        after: Option<&ProjectCursor>,
    ) -> Result<Vec<Project>> {
        let variables = json!({
            "first": first,
            "after": after.map(|cursor| cursor.0.clone()),
        });

        let data: ViewerProjectsData = self.execute(VIEWER_PROJECTS_QUERY, variables).await?;

        Ok(data
            .viewer
            .projects_v2
            .edges
            .into_iter()
            .map(|edge| {
                let node = edge.node;
                Project {
                    id: node.id,
                    title: node.title,
                    number: node.number,
                    url: node.url,
                    creator_login: node.creator.login,
                    creator_url: node.creator.url,
                    cursor: Some(ProjectCursor(edge.cursor)),
                }
            })
            .collect())
    }

    /// Fetches a single project by its node id.
    pub async fn project_by_id(&self, id: &ProjectId) -> Result<Project> {
        let data: NodeData<ProjectNode> = self
            .execute(PROJECT_BY_ID_QUERY, json!({ "id": id.0 }))
            .await?;

        let node = data.node.and_then(|node| node.into_project()).ok_or_else(|| {
            GithubError::EmptyResponse(
                "the node behind this id is not a ProjectV2 board".to_string(),
            )
        })?;

        Ok(Project {
            id: node.id,
            title: node.title,
            number: node.number,
            url: node.url,
            creator_login: node.creator.login,
            creator_url: node.creator.url,
            cursor: None,
        })
    }

    /// Item titles of a project grouped by status column, restricted to
    /// items assigned to the viewer.
    pub async fn list_project_items(
        &self,
        id: &ProjectId,
        first: u32,
        after: Option<&ProjectCursor>,
    ) -> Result<ItemsByStatus> {
        let variables = json!({
            "id": id.0,
            "first": first,
            "after": after.map(|cursor| cursor.0.clone()),
        });

        let data: NodeData<ItemsNode> = self.execute(PROJECT_ITEMS_QUERY, variables).await?;

        let node = data.node.ok_or_else(|| {
            GithubError::EmptyResponse(
                "the node behind this id is not a ProjectV2 board".to_string(),
            )
        })?;

        Ok(group_items_by_status(node.items.nodes))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .http
            .post(GITHUB_GRAPHQL_URL)
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, GITHUB_USER_AGENT)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(%status, body_len = body.len(), "github graphql request failed");
            return Err(GithubError::Http(format!(
                "github graphql status={status} body={body}"
            )));
        }

        let envelope: GraphQlResponse<T> = serde_json::from_str(&body)?;

        if let Some(error) = envelope.errors.into_iter().flatten().next() {
            return Err(GithubError::GraphQl(error.message));
        }

        envelope.data.ok_or_else(|| {
            GithubError::ResponseFormat("response carried neither data nor errors".to_string())
        })
    }
}

/// Keeps an item when it has a title, a known status column, and the viewer
/// among its assignees.
fn group_items_by_status(nodes: Vec<ItemNode>) -> ItemsByStatus {
    let mut by_status = ItemsByStatus::new();

    for node in nodes {
        let Some(title) = node.content.and_then(|content| content.title) else {
            continue;
        };
        let Some(status) = node.status.and_then(|status| status.name) else {
            continue;
        };
        let assigned_to_viewer = node
            .assigned_to
            .map(|assigned| assigned.users.nodes.iter().any(|user| user.is_viewer))
            .unwrap_or(false);
        if !assigned_to_viewer {
            continue;
        }

        by_status.entry(status).or_insert_with(Vec::new).push(title);
    }

    by_status
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct GraphQlResponse<T> {
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    viewer: LoginViewer,
}

#[derive(Debug, Deserialize)]
struct LoginViewer {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ViewerProjectsData {
    viewer: ProjectsViewer,
}

#[derive(Debug, Deserialize)]
struct ProjectsViewer {
    #[serde(rename = "projectsV2")]
    projects_v2: ProjectConnection,
}

#[derive(Debug, Deserialize)]
struct ProjectConnection {
    #[serde(default)]
    edges: Vec<ProjectEdge>,
}

#[derive(Debug, Deserialize)]
struct ProjectEdge {
    cursor: String,
    node: ProjectFields,
}

#[derive(Debug, Deserialize)]
struct NodeData<T> {
    #[serde(default)]
    node: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ProjectFields {
    id: ProjectId,
    title: String,
    number: i64,
    url: String,
    creator: Creator,
}

#[derive(Debug, Deserialize)]
struct Creator {
    login: String,
    url: String,
}

/// The inline fragment leaves an empty object behind when the node exists
/// but is not a ProjectV2, so every field is optional here.
#[derive(Debug, Default, Deserialize)]
struct ProjectNode {
    #[serde(default)]
    id: Option<ProjectId>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    number: Option<i64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    creator: Option<Creator>,
}

impl ProjectNode {
    fn into_project(self) -> Option<ProjectFields> {
        Some(ProjectFields {
            id: self.id?,
            title: self.title?,
            number: self.number?,
            url: self.url?,
            creator: self.creator?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ItemsNode {
    #[serde(default)]
    items: ItemConnection,
}

#[derive(Debug, Default, Deserialize)]
struct ItemConnection {
    #[serde(default)]
    nodes: Vec<ItemNode>,
}

#[derive(Debug, Deserialize)]
struct ItemNode {
    #[serde(default)]
    status: Option<StatusValue>,
    #[serde(default, rename = "assignedTo")]
    assigned_to: Option<AssignedTo>,
    #[serde(default)]
    content: Option<ItemContent>,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignedTo {
    #[serde(default)]
    users: UserConnection,
}

#[derive(Debug, Default, Deserialize)]
struct UserConnection {
    #[serde(default)]
    nodes: Vec<AssignedUser>,
}

#[derive(Debug, Deserialize)]
struct AssignedUser {
    #[serde(default, rename = "isViewer")]
    is_viewer: bool,
}

#[derive(Debug, Deserialize)]
struct ItemContent {
    #[serde(default)]
    title: Option<String>,
}
