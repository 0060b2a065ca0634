//! GitLab v4 REST client implementing [`RepositoryClient`].

use std::time::Duration;

use async_trait::async_trait;
use lodestar_core::{
    LodestarError, Page, PageRequest, Paginator, Project, ProjectTree, ProjectTreeNode,
    RepositoryClient, RepositoryFile, Result,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::GitlabConfig;

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const TOTAL_PAGES_HEADER: &str = "x-total-pages";
/// GitLab pages are 1-based
const FIRST_PAGE: u32 = 1;

pub struct GitlabClient {
    http: Client,
    base_url: Url,
    token: String,
    search_scope: String,
    paginator: Paginator,
}

impl GitlabClient {
    pub fn new(config: &GitlabConfig, page_size: u32) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| LodestarError::Config(format!("invalid gitlab.base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(LodestarError::Config(format!(
                "gitlab.base_url {} cannot be used as a base",
                config.base_url
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LodestarError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
            search_scope: config.project_search_scope.clone(),
            paginator: Paginator::new(page_size, FIRST_PAGE),
        })
    }

    /// `{base}/api/v4/{segments...}`, each segment percent-encoded on its
    /// own so file paths keep their slashes escaped.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v4"]).extend(segments);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(TOKEN_HEADER, &self.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(transport)?;
        check_status(response)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        mut query: Vec<(&'static str, String)>,
        request: PageRequest,
    ) -> Result<Page<T>> {
        query.push(("per_page", request.per_page.to_string()));
        query.push(("page", request.page.to_string()));

        let response = self.send(self.http.get(url).query(&query)).await?;
        let total_pages = response
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());
        let items = response.json::<Vec<T>>().await.map_err(transport)?;
        Ok(Page::new(items, total_pages))
    }
}

fn transport(e: reqwest::Error) -> LodestarError {
    if e.is_timeout() {
        LodestarError::Transport(format!("request timed out: {}", e))
    } else {
        LodestarError::Transport(e.to_string())
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(LodestarError::Status {
            status: status.as_u16(),
            url: response.url().path().to_string(),
        })
    }
}

#[async_trait]
impl RepositoryClient for GitlabClient {
    #[instrument(skip(self))]
    async fn list_projects(&self, group_id: u64, include_subgroups: bool) -> Result<Vec<Project>> {
        let url = self.endpoint(&["groups", &group_id.to_string(), "projects"]);
        let projects: Vec<Project> = self
            .paginator
            .fetch_all(|request| {
                let query = vec![("include_subgroups", include_subgroups.to_string())];
                self.get_page(url.clone(), query, request)
            })
            .await?;
        debug!(count = projects.len(), "Listed group projects");
        Ok(projects)
    }

    #[instrument(skip(self))]
    async fn list_tree(
        &self,
        project_id: u64,
        branch: &str,
        recursive: bool,
    ) -> Result<ProjectTree> {
        let url = self.endpoint(&["projects", &project_id.to_string(), "repository", "tree"]);
        let nodes: Vec<ProjectTreeNode> = self
            .paginator
            .fetch_all(|request| {
                let query = vec![
                    ("recursive", recursive.to_string()),
                    ("ref", branch.to_string()),
                ];
                self.get_page(url.clone(), query, request)
            })
            .await?;
        Ok(ProjectTree::new(project_id, nodes))
    }

    #[instrument(skip(self))]
    async fn read_file(
        &self,
        project_id: u64,
        path: &str,
        branch: &str,
    ) -> Result<Option<RepositoryFile>> {
        let url = self.endpoint(&[
            "projects",
            &project_id.to_string(),
            "repository",
            "files",
            path,
        ]);
        let response = self
            .authorized(self.http.get(url).query(&[("ref", branch)]))
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("File not found");
            return Ok(None);
        }
        let file = check_status(response)?
            .json::<RepositoryFile>()
            .await
            .map_err(transport)?;
        Ok(Some(file))
    }

    #[instrument(skip(self, file), fields(path = %file.file_path))]
    async fn write_file(&self, project_id: u64, file: &RepositoryFile, is_update: bool) -> Result<()> {
        let url = self.endpoint(&[
            "projects",
            &project_id.to_string(),
            "repository",
            "files",
            &file.file_path,
        ]);
        let request = if is_update {
            self.http.put(url)
        } else {
            self.http.post(url)
        };
        self.send(request.json(file)).await?;
        debug!("Committed file");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search_projects(&self, group_id: u64, engagement_uuid: &str) -> Result<Vec<Project>> {
        let url = self.endpoint(&["groups", &group_id.to_string(), "search"]);
        let request = self
            .http
            .get(url)
            .query(&[("scope", self.search_scope.as_str()), ("search", engagement_uuid)]);
        let projects = self
            .send(request)
            .await?
            .json::<Vec<Project>>()
            .await
            .map_err(transport)?;
        Ok(projects)
    }
}
