//! End-to-end pipeline runs over real HTTP: the catalog client and redirect
//! resolver talk to a `wiremock` server, page rendering is stubbed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linkhelper_scraper::{
    format_outcome, CatalogClient, Outcome, PageLinkSource, Pipeline, RedirectResolver,
    ScraperError,
};

/// Page source that returns a fixed candidate list.
struct StaticPage(Vec<String>);

#[async_trait]
impl PageLinkSource for StaticPage {
    async fn extract(&self, _page_url: &str) -> Result<Vec<String>, ScraperError> {
        Ok(self.0.clone())
    }
}

fn pipeline(server: &MockServer, page_links: Vec<String>) -> Pipeline {
    let resolver = RedirectResolver::new(5, 10, "linkhelper-test/0.1", 4).expect("resolver");
    let catalog = CatalogClient::new(&server.uri(), 50, 5, "linkhelper-test/0.1").expect("catalog");
    Pipeline::new(
        Arc::new(resolver),
        Arc::new(catalog),
        Arc::new(StaticPage(page_links)),
        4,
    )
}

async fn mount_share(server: &MockServer, id: &str, target: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/share/{id}")))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", target))
        .mount(server)
        .await;
}

async fn mount_product(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/product/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn catalog_post_resolves_every_product_link() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/getPostOrCollectionProducts"))
        .and(query_param("postOrCollectionId", "31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "products": [
                { "purchaseUrl": format!("{base}/share/2") },
                { "purchaseUrl": format!("{base}/share/1") },
                { "purchaseUrl": format!("{base}/share/dup") },
            ]}
        })))
        .mount(&server)
        .await;
    mount_share(&server, "2", "/product/2").await;
    mount_share(&server, "1", "/product/1").await;
    mount_share(&server, "dup", "/product/2").await;
    mount_product(&server, "1").await;
    mount_product(&server, "2").await;

    let outcome = pipeline(&server, Vec::new())
        .run(&format!("{base}/creator/post/31"))
        .await;

    let Outcome::Found(set) = outcome else {
        panic!("expected Found, got {outcome:?}");
    };
    assert_eq!(
        set.as_slice(),
        [format!("{base}/product/2"), format!("{base}/product/1")]
    );
}

#[tokio::test]
async fn failed_catalog_falls_back_to_page_candidates() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/getPostOrCollectionProducts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_share(&server, "9", "/product/9").await;
    mount_product(&server, "9").await;

    let outcome = pipeline(&server, vec![format!("{base}/share/9")])
        .run(&format!("{base}/creator/post/31"))
        .await;

    assert_eq!(
        outcome,
        Outcome::Found(std::iter::once(format!("{base}/product/9")).collect())
    );
}

#[tokio::test]
async fn unresolvable_candidates_render_not_found_reply() {
    let server = MockServer::start().await;

    let outcome = pipeline(&server, vec!["http://127.0.0.1:9/share/x".to_owned()])
        .run(&format!("{}/creator", server.uri()))
        .await;

    let reply = format_outcome(&outcome);
    assert_eq!(reply.text, linkhelper_scraper::format::NOT_FOUND_MESSAGE);
}
