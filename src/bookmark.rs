use reqwest::Client;
use scraper::{Html, Selector};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::normalize_url;

/// Saves a page as a bookmark, titled after its `<title>`. Returns the stored title.
pub async fn add_bookmark(repo: &Repository, client: &Client, input: &str) -> Result<String> {
    let url = normalize_url(input);

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(AppError::Status {
            url,
            status: response.status().as_u16(),
        });
    }
    let body = response.text().await?;

    let title = page_title(&body)?.unwrap_or_else(|| url.clone());
    if !repo.add_bookmark(&url, &title).await? {
        tracing::info!(url = %url, "bookmark already stored");
    }
    Ok(title)
}

fn page_title(html: &str) -> Result<Option<String>> {
    let selector = Selector::parse("title")
        .map_err(|e| anyhow::anyhow!("invalid title selector: {}", e))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn reads_trimmed_title() {
        let html = "<html><head><title>\n  Hello  </title></head></html>";
        assert_eq!(page_title(html).unwrap().as_deref(), Some("Hello"));
        assert_eq!(page_title("<p>no title</p>").unwrap(), None);
    }

    #[tokio::test]
    async fn bookmark_falls_back_to_url_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>x</p>", "text/html"))
            .mount(&server)
            .await;
        let tmpdir = tempfile::tempdir().unwrap();
        let repo = Repository::new(tmpdir.path().join("t.db").to_string_lossy().as_ref())
            .await
            .unwrap();

        let url = format!("{}/page", server.uri());
        let title = add_bookmark(&repo, &Client::new(), &url).await.unwrap();
        assert_eq!(title, url);

        let stored = repo.get_article(&url).await.unwrap().unwrap();
        assert!(stored.read);
        assert_eq!(stored.tags, vec!["bookmark".to_string()]);
    }
}
