//! RSS 2.0 rendering and the year-grouped article index.

use std::io::Cursor;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use serde::Serialize;

use crate::db::Article;

/// Channel metadata of the feed.
#[derive(Debug, Clone)]
pub struct Channel<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
    pub language: &'a str,
}

/// Articles published in one calendar year, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct IndexYear {
    pub year: i32,
    pub articles: Vec<Article>,
}

/// Stable permalink used as both `<link>` and `<guid>`.
#[must_use]
pub fn article_permalink(domain: &str, id: i32) -> String {
    format!("{}/article/by-id/{id}", domain.trim_end_matches('/'))
}

/// HTML-escapes the teaser and turns line breaks into `<br>`.
#[must_use]
pub fn teaser_html(teaser: &str) -> String {
    html_escape::encode_text(teaser)
        .replace("\r\n", "\n")
        .replace('\n', "<br>")
}

fn text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> std::io::Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Renders an RSS 2.0 document. `items` are emitted in the given order.
pub fn render_rss(channel: &Channel<'_>, items: &[Article]) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    writer
        .create_element("rss")
        .with_attribute(("version", "2.0"))
        .write_inner_content(|w| {
            w.create_element("channel").write_inner_content(|w| {
                text_element(w, "title", channel.title)?;
                text_element(w, "link", channel.link)?;
                text_element(w, "description", channel.description)?;
                text_element(w, "language", channel.language)?;

                for article in items {
                    let permalink = article_permalink(channel.link, article.id);
                    w.create_element("item").write_inner_content(|w| {
                        text_element(w, "title", &article.headline)?;
                        text_element(w, "link", &permalink)?;
                        text_element(w, "description", &teaser_html(&article.teaser))?;
                        text_element(w, "author", &article.author.display_name)?;
                        if let Some(published_on) = article.published_on {
                            text_element(w, "pubDate", &published_on.to_rfc2822())?;
                        }
                        w.create_element("guid")
                            .with_attribute(("isPermaLink", "true"))
                            .write_text_content(BytesText::new(&permalink))?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
            Ok(())
        })
        .context("Failed to write RSS document")?;

    String::from_utf8(writer.into_inner().into_inner()).context("RSS document is not UTF-8")
}

fn publication_year(article: &Article) -> i32 {
    article
        .published_on
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .year()
}

/// Folds consecutive articles sharing a publication year into one group.
///
/// Expects the input sorted by `published_on` descending.
#[must_use]
pub fn group_by_year(articles: Vec<Article>) -> Vec<IndexYear> {
    let mut groups: Vec<IndexYear> = Vec::new();

    for article in articles {
        let year = publication_year(&article);
        match groups.last_mut() {
            Some(group) if group.year == year => group.articles.push(article),
            _ => groups.push(IndexYear {
                year,
                articles: vec![article],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Author;
    use crate::domain::UserId;
    use chrono::TimeZone;

    fn article(id: i32, year: i32) -> Article {
        let at = Utc.with_ymd_and_hms(year, 5, 1, 8, 0, 0).unwrap();
        Article {
            id,
            headline: format!("Post <{id}>"),
            teaser: "line one\nline & two".to_string(),
            content: String::new(),
            slug: format!("{year}/5/post-{id}"),
            published: true,
            published_on: Some(at),
            last_modified: at,
            category: None,
            author: Author {
                id: UserId::new(1),
                username: "admin".to_string(),
                display_name: "Admin".to_string(),
            },
        }
    }

    #[test]
    fn teaser_is_escaped_and_broken() {
        assert_eq!(teaser_html("a < b\nc"), "a &lt; b<br>c");
        assert_eq!(teaser_html("x\r\ny"), "x<br>y");
    }

    #[test]
    fn permalink_ignores_trailing_slash() {
        assert_eq!(
            article_permalink("https://blog.example.com/", 42),
            "https://blog.example.com/article/by-id/42"
        );
    }

    #[test]
    fn rss_contains_channel_and_items() {
        let channel = Channel {
            title: "My Blog",
            link: "https://blog.example.com",
            description: "Notes & thoughts",
            language: "en-us",
        };
        let xml = render_rss(&channel, &[article(2, 2024), article(1, 2023)]).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\">"));
        assert!(xml.contains("<title>My Blog</title>"));
        assert!(xml.contains("<description>Notes &amp; thoughts</description>"));
        assert!(xml.contains("<title>Post &lt;2&gt;</title>"));
        assert!(xml.contains(
            "<guid isPermaLink=\"true\">https://blog.example.com/article/by-id/2</guid>"
        ));
        assert!(xml.contains("line one&lt;br&gt;line &amp;amp; two"));

        let first = xml.find("by-id/2").unwrap();
        let second = xml.find("by-id/1").unwrap();
        assert!(first < second);
    }

    #[test]
    fn group_by_year_folds_consecutive_years() {
        let groups = group_by_year(vec![
            article(4, 2025),
            article(3, 2025),
            article(2, 2024),
            article(1, 2022),
        ]);

        let shape: Vec<(i32, usize)> = groups.iter().map(|g| (g.year, g.articles.len())).collect();
        assert_eq!(shape, vec![(2025, 2), (2024, 1), (2022, 1)]);
        assert_eq!(groups[0].articles[0].id, 4);
    }

    #[test]
    fn group_by_year_empty() {
        assert!(group_by_year(Vec::new()).is_empty());
    }
}
