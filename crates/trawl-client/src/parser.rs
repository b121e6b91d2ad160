use std::collections::HashSet;
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use trawl_core::error::AppError;
use trawl_core::models::{ParseOptions, ParsedPage};
use trawl_core::traits::PageParser;
use url::Url;

/// Containers tried in order for article text when no `articleBody` or
/// `<article>` element is present.
const NEWS_SELECTORS: &[&str] = &[
    ".article-content",
    ".post-content",
    ".entry-content",
    "#article-body",
    "#story-body",
    ".story-body",
    "main p",
    ".content p",
];

/// Links ending in one of these are not pages.
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".css", ".js", ".ico", ".svg", ".xml", ".json",
    ".mp3", ".mp4", ".avi", ".mov", ".mpg", ".mpeg", ".zip", ".tar", ".gz", ".rar",
];

/// Links containing one of these are boilerplate (feeds, admin, auth flows).
const SKIP_PATTERNS: &[&str] = &[
    "/cdn-cgi/",
    "/wp-admin/",
    "/wp-includes/",
    "javascript:",
    "mailto:",
    "tel:",
    "sms:",
    "/feed/",
    "/rss/",
    "/print/",
    "/search?",
    "login",
    "logout",
    "signin",
    "signup",
    "register",
];

struct Selectors {
    title: Selector,
    description: Selector,
    og_description: Selector,
    paragraph: Selector,
    article_body: Selector,
    article: Selector,
    news: Vec<Selector>,
    anchor: Selector,
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::ParseError(format!("invalid selector '{css}': {e}")))
}

/// HTML parser built on `scraper`.
///
/// Extracts title, description, body text (every paragraph, or the article
/// body in news mode) and outbound page links.
#[derive(Clone)]
pub struct HtmlParser {
    selectors: Arc<Selectors>,
}

impl HtmlParser {
    pub fn new() -> Result<Self, AppError> {
        let selectors = Selectors {
            title: selector("title")?,
            description: selector(r#"meta[name="description"]"#)?,
            og_description: selector(r#"meta[property="og:description"]"#)?,
            paragraph: selector("p")?,
            article_body: selector(r#"[itemprop="articleBody"]"#)?,
            article: selector("article")?,
            news: NEWS_SELECTORS
                .iter()
                .map(|css| selector(css))
                .collect::<Result<_, _>>()?,
            anchor: selector("a[href]")?,
        };
        Ok(Self {
            selectors: Arc::new(selectors),
        })
    }

    fn title(&self, doc: &Html) -> String {
        doc.select(&self.selectors.title)
            .next()
            .map(|el| element_text(&el))
            .unwrap_or_default()
    }

    /// Last `content` of the named description meta, else of `og:description`.
    fn description(&self, doc: &Html) -> String {
        let last_content = |sel: &Selector| {
            doc.select(sel)
                .filter_map(|el| el.value().attr("content"))
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .last()
                .map(String::from)
        };
        last_content(&self.selectors.description)
            .or_else(|| last_content(&self.selectors.og_description))
            .unwrap_or_default()
    }

    fn paragraphs(&self, doc: &Html) -> String {
        doc.select(&self.selectors.paragraph)
            .map(|el| element_text(&el))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn article_text(&self, doc: &Html) -> String {
        let body = doc
            .select(&self.selectors.article_body)
            .map(|el| element_text(&el))
            .collect::<String>();
        if !body.is_empty() {
            return body;
        }

        if let Some(article) = doc.select(&self.selectors.article).next() {
            return element_text(&article);
        }

        self.selectors
            .news
            .iter()
            .map(|sel| {
                doc.select(sel)
                    .map(|el| element_text(&el))
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .find(|text| !text.is_empty())
            .unwrap_or_default()
    }

    fn links(&self, doc: &Html, base: &Url) -> Vec<String> {
        let mut seen = HashSet::new();
        doc.select(&self.selectors.anchor)
            .filter_map(|el| el.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty() && !href.starts_with('#'))
            .filter_map(|href| base.join(href).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .map(|mut url| {
                url.set_fragment(None);
                url.to_string()
            })
            .filter(|url| !should_skip_url(url))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}

impl PageParser for HtmlParser {
    fn parse(
        &self,
        html: &str,
        base_url: &str,
        options: &ParseOptions,
    ) -> Result<ParsedPage, AppError> {
        let base = Url::parse(base_url).map_err(|e| AppError::invalid_url(base_url, e))?;
        let doc = Html::parse_document(html);

        let content = if options.news_mode {
            self.article_text(&doc)
        } else {
            self.paragraphs(&doc)
        };

        Ok(ParsedPage {
            title: self.title(&doc),
            description: self.description(&doc),
            content: (!content.is_empty()).then_some(content),
            links: self.links(&doc, &base),
        })
    }
}

/// Concatenated, trimmed text of an element.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// True for links to non-page resources and boilerplate paths.
pub fn should_skip_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    SKIP_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        || SKIP_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}
