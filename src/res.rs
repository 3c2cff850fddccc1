use axum::response::Html;

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            c => out.push(c),
        }
    }
    out
}

/// Wraps `body` in the shared layout with any flashed messages on top.
pub fn page(title: &str, flashes: &[String], body: &str) -> Html<String> {
    let flashes: String = flashes
        .iter()
        .map(|f| include_res!(str, "/pages/flash.html").replace("{message}", &escape(f)))
        .collect();

    Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{flashes}", &flashes)
            .replace("{body}", body),
    )
}

/// `<option>` elements for a select box.
pub fn options<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| {
            let item = escape(item.as_ref());
            format!("<option value=\"{item}\">{item}</option>")
        })
        .collect()
}

/// Whether a link target written by a user may be followed: relative, or
/// one of the web and mail schemes.
fn is_safe_link(dest: &str) -> bool {
    // browsers ignore whitespace and control characters inside a scheme
    let dest: String = dest.chars().filter(|c| !c.is_ascii_whitespace() && !c.is_control()).collect();
    match dest.find([':', '/', '?', '#']) {
        Some(i) if dest[i..].starts_with(':') => {
            let scheme = dest[..i].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

/// Renders user-written Markdown, dropping any raw HTML it carries and
/// defusing links to anything but web or mail targets.
pub fn markdown(text: &str) -> String {
    use pulldown_cmark::{CowStr, Event, Parser, Tag};

    let parser = Parser::new(text).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) if !is_safe_link(&dest_url) => {
            tracing::warn!(dest = %dest_url, "defused message link");
            Event::Start(Tag::Link { link_type, dest_url: CowStr::Borrowed("#"), title, id })
        }
        Event::Start(Tag::Image { link_type, dest_url, title, id }) if !is_safe_link(&dest_url) => {
            tracing::warn!(dest = %dest_url, "defused message image");
            Event::Start(Tag::Image { link_type, dest_url: CowStr::Borrowed("#"), title, id })
        }
        _ => event,
    });

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    // rendered text is spliced into templates, so no placeholder may survive
    html.replace('{', "&#123;").replace('}', "&#125;")
}
