use reqwest::{StatusCode, Url};
use serenity::async_trait;

use crate::{
    cache::FetchClassError,
    course::{Query, SectionRecord},
};

/// Where fresh enrollment data comes from.
#[async_trait]
pub trait CourseSource: Send + Sync {
    async fn fetch(&self, query: &Query) -> Result<Vec<SectionRecord>, FetchClassError>;
}

/// Reads sections from a JSON endpoint laid out as
/// `{base}/courses/{course}/{semester}/{career}`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self, FetchClassError> {
        let base_url =
            Url::parse(base_url).map_err(|err| FetchClassError::BaseUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchClassError::BaseUrl(base_url.to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    fn url(&self, query: &Query) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "courses",
                query.course.as_str(),
                query.semester.as_str(),
                query.career.as_str(),
            ]);
        }
        url
    }
}

#[async_trait]
impl CourseSource for HttpSource {
    async fn fetch(&self, query: &Query) -> Result<Vec<SectionRecord>, FetchClassError> {
        let url = self.url(query);
        tracing::debug!(%url, "fetching course");

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchClassError::CourseNotFound(query.course.clone()));
        }

        Ok(response.error_for_status()?.json().await?)
    }
}
