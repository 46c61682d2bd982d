//! Canonical location resolution and metadata retrieval.

use std::sync::Arc;

use thumbs_core::config::{MetaFetchHeader, SchemaConfig};
use thumbs_core::{Error, ResourceMeta};

use crate::fetch::{RepoTransport, metadata_url, relation_search_url, strip_metadata_suffix};
use crate::graph::{Graph, describe_resource};

const NTRIPLES: &str = "application/n-triples";

/// Where a resource's metadata was finally read from.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Canonical binary location; the title image's when one was found.
    pub real_url: String,
    /// Metadata graph describing `real_url`.
    pub graph: Graph,
    /// Metadata of the requested resource itself when `real_url` is its title image.
    pub original: Option<Graph>,
}

/// Follows redirects and title-image relations to a canonical binary.
pub struct RemoteResolver {
    transport: Arc<dyn RepoTransport>,
    schema: SchemaConfig,
    meta_header: MetaFetchHeader,
}

impl RemoteResolver {
    pub fn new(transport: Arc<dyn RepoTransport>, schema: SchemaConfig, meta_header: MetaFetchHeader) -> Self {
        Self { transport, schema, meta_header }
    }

    /// Final location of `url` after the whole redirect chain.
    ///
    /// A transport failure is terminal and is not retried.
    pub async fn resolve(&self, url: &str) -> Result<String, Error> {
        let final_url = self.transport.head(url).await?;
        Ok(strip_metadata_suffix(&final_url).to_string())
    }

    /// Look for a resource declaring itself the title image of `id`.
    ///
    /// Returns the title image location and its own metadata. A non-200
    /// search answer means "none".
    pub async fn find_title_image(&self, real_url: &str, id: &str) -> Result<Option<(String, Graph)>, Error> {
        let search = relation_search_url(real_url, &self.schema.title_image, id)
            .map_err(|e| Error::ResolutionFailed(e.to_string()))?;

        let response = self.transport.get(search.as_str(), &self.headers()).await?;
        if response.status != 200 {
            tracing::debug!(id, status = response.status, "title image search unavailable");
            return Ok(None);
        }

        let graph = Graph::parse(&response.bytes)?;
        let Some(subject) = graph.subject_with(&self.schema.search_match) else {
            return Ok(None);
        };
        let subject = subject.to_string();
        let restricted = graph.restrict_to(&subject);
        Ok(Some((subject, restricted)))
    }

    /// Resource-only metadata of `real_url`.
    pub async fn fetch_metadata(&self, real_url: &str) -> Result<Graph, Error> {
        let url = metadata_url(real_url);
        let response = self.transport.get(&url, &self.headers()).await?;
        if !response.is_success() {
            return Err(Error::HttpError(format!("{url}: status {}", response.status)));
        }
        Graph::parse(&response.bytes)
    }

    /// Resolve `id` and fetch the graph describing its canonical binary.
    ///
    /// Title-image lookup failures are logged and ignored; the resource
    /// itself is described instead. When a title image is found the
    /// resource's own metadata is still fetched.
    pub async fn locate(&self, id: &str) -> Result<Resolution, Error> {
        let real_url = self.resolve(id).await?;

        let title_image = match self.find_title_image(&real_url, id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(id, error = %e, "title image search failed");
                None
            }
        };

        let own = self.resource_graph(&real_url).await?;
        match title_image {
            Some((title_url, graph)) => {
                tracing::info!(id, title_image = %title_url, "thumbnail pointing to the resource found");
                Ok(Resolution { real_url: title_url, graph, original: Some(own) })
            }
            None => Ok(Resolution { real_url, graph: own, original: None }),
        }
    }

    /// Fresh, unstamped metadata for `id`.
    ///
    /// Read access and class always come from the requested resource, even
    /// when the binary is its title image.
    pub async fn describe(&self, id: &str) -> Result<ResourceMeta, Error> {
        let resolution = self.locate(id).await?;
        let mut meta = describe_resource(&resolution.graph, &self.schema, id, &resolution.real_url);
        if let Some(original) = &resolution.original {
            let own = describe_resource(original, &self.schema, id, &resolution.real_url);
            meta.acl_read = own.acl_read;
            meta.class = own.class;
        }
        Ok(meta)
    }

    /// Metadata of `real_url`, restricted to its own triples when it has any.
    async fn resource_graph(&self, real_url: &str) -> Result<Graph, Error> {
        let graph = self.fetch_metadata(real_url).await?;
        let described = graph.restrict_to(real_url);
        Ok(if described.is_empty() { graph } else { described })
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            (self.meta_header.name.clone(), self.meta_header.value.clone()),
            ("Accept".to_string(), NTRIPLES.to_string()),
        ]
    }
}
