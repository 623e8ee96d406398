//! Server-side HTML for the browser.
use crate::detail::TrailerState;
use crate::toast::ToastKind;
use crate::ui::{CardView, OverlayView, ViewModel};
use std::fmt::Write;

const STYLE: &str = "body{margin:0;background:#141414;color:#fff;font-family:sans-serif}\
.banner{position:relative;height:60vh;background-size:cover;background-position:center}\
.banner .info{position:absolute;bottom:10%;left:4%;max-width:40%}\
.row{padding:0 4%}.row .cards{display:flex;gap:8px;overflow-x:auto}\
.card button{background:none;border:0;padding:0;cursor:pointer}.card img{height:160px;border-radius:4px}\
.overlay{position:fixed;top:3.5rem;left:0;right:0;margin:auto;max-width:64rem;background:#181818;border-radius:6px;z-index:50}\
.player{position:relative;padding-top:56.25%;background:#000}\
.player iframe{position:absolute;top:0;left:0;width:100%;height:100%;border:0}\
.player .notice{position:absolute;top:45%;width:100%;text-align:center;font-size:1.5rem;color:#9ca3af}\
.controls{display:flex;gap:8px;padding:12px 40px}.details{padding:24px 40px}\
.match{color:#4ade80;font-weight:600}.muted-label{color:gray}.error{color:#f87171}\
.toasts{position:fixed;bottom:16px;left:0;right:0;display:flex;flex-direction:column;align-items:center;gap:8px}\
.toast{background:#fff;color:#000;font-weight:bold;padding:15px;border-radius:9999px;max-width:1000px}\
.toast.error{background:#fee2e2}";

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn trailer_embed_url(key: &str, muted: bool) -> String {
    format!(
        "https://www.youtube.com/embed/{}?autoplay=1&mute={}",
        urlencoding::encode(key),
        u8::from(muted)
    )
}

pub fn render_page(view: &ViewModel) -> String {
    let mut html = String::new();
    html.push_str("<!doctype html><html><head><meta charset=\"utf-8\"><title>Home</title><style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body>");

    render_header(&mut html, view);
    render_banner(&mut html, view.banner.as_ref());
    if view.signed_in.is_some() && !view.my_list.is_empty() {
        render_row(&mut html, "My List", &view.my_list);
    }
    for row in &view.rows {
        render_row(&mut html, &row.title, &row.items);
    }
    if let Some(overlay) = &view.overlay {
        render_overlay(&mut html, overlay);
    }
    render_toasts(&mut html, view);

    html.push_str("</body></html>");
    html
}

fn render_header(html: &mut String, view: &ViewModel) {
    html.push_str("<header>");
    match &view.signed_in {
        Some(user) => {
            let _ = write!(html, "<span>Signed in as {}</span>", escape(user));
        }
        None => html.push_str("<span>Not signed in</span>"),
    }
    html.push_str("</header>");
}

fn render_banner(html: &mut String, banner: Option<&CardView>) {
    let Some(card) = banner else {
        html.push_str("<section class=\"banner\"></section>");
        return;
    };
    let style = card
        .artwork
        .as_deref()
        .map(|url| format!(" style=\"background-image:url('{}')\"", escape(url)))
        .unwrap_or_default();
    let _ = write!(
        html,
        "<section class=\"banner\"{}><div class=\"info\"><h1>{}</h1><p>{}</p>",
        style,
        escape(&card.title),
        escape(&card.overview)
    );
    select_form(html, card, "More Info");
    html.push_str("</div></section>");
}

fn select_form(html: &mut String, card: &CardView, label: &str) {
    let _ = write!(
        html,
        "<form method=\"post\" action=\"/select\">\
<input type=\"hidden\" name=\"media_type\" value=\"{}\">\
<input type=\"hidden\" name=\"id\" value=\"{}\">\
<button type=\"submit\">{}</button></form>",
        card.media_type,
        card.id,
        label
    );
}

fn render_row(html: &mut String, title: &str, cards: &[CardView]) {
    let _ = write!(
        html,
        "<section class=\"row\"><h2>{}</h2><div class=\"cards\">",
        escape(title)
    );
    for card in cards {
        html.push_str("<div class=\"card\">");
        let label = match &card.poster {
            Some(url) => format!(
                "<img src=\"{}\" alt=\"{}\">",
                escape(url),
                escape(&card.title)
            ),
            None => escape(&card.title),
        };
        select_form(html, card, &label);
        html.push_str("</div>");
    }
    html.push_str("</div></section>");
}

fn render_overlay(html: &mut String, overlay: &OverlayView) {
    html.push_str("<div class=\"overlay\" role=\"dialog\">");
    html.push_str(
        "<form method=\"post\" action=\"/close\"><button type=\"submit\" aria-label=\"Close\">&times;</button></form>",
    );

    html.push_str("<div class=\"player\">");
    match &overlay.trailer {
        TrailerState::Ready { key } => {
            let _ = write!(
                html,
                "<iframe src=\"{}\" allow=\"autoplay\" allowfullscreen></iframe>",
                escape(&trailer_embed_url(key, overlay.muted))
            );
        }
        TrailerState::Loading => notice(html, "Loading..."),
        TrailerState::Unavailable => notice(html, "Sorry, no trailer is available for this title"),
        TrailerState::Failed { .. } => notice(html, "Sorry, the video could not be loaded"),
        TrailerState::Idle | TrailerState::Closed => {}
    }
    html.push_str("</div>");

    html.push_str("<div class=\"controls\">");
    let list_label = if overlay.list_pending {
        "Saving..."
    } else if overlay.in_list {
        "&#10003; In My List"
    } else {
        "+ My List"
    };
    let _ = write!(
        html,
        "<form method=\"post\" action=\"/my-list/toggle\"><button type=\"submit\"{}>{}</button></form>",
        if overlay.list_pending { " disabled" } else { "" },
        list_label
    );
    let _ = write!(
        html,
        "<form method=\"post\" action=\"/mute\"><button type=\"submit\">{}</button></form>",
        if overlay.muted { "Unmute" } else { "Mute" }
    );
    html.push_str("</div>");
    if let Some(err) = &overlay.list_error {
        let _ = write!(
            html,
            "<p class=\"error\">{} <form method=\"post\" action=\"/my-list/toggle\"><button type=\"submit\">Retry</button></form></p>",
            escape(err)
        );
    }

    let _ = write!(
        html,
        "<div class=\"details\"><h2>{}</h2><p><span class=\"match\">{}% Match</span> {}</p>\
<p>{}</p>\
<p><span class=\"muted-label\">Genres:</span> {}</p>\
<p><span class=\"muted-label\">Language:</span> {}</p>\
<p><span class=\"muted-label\">Total votes:</span> {}</p></div>",
        escape(&overlay.title),
        overlay.match_percent,
        escape(overlay.date.as_deref().unwrap_or("")),
        escape(&overlay.overview),
        escape(&overlay.genres),
        escape(&overlay.language),
        overlay.vote_count
    );
    html.push_str("</div>");
}

fn notice(html: &mut String, text: &str) {
    let _ = write!(html, "<p class=\"notice\">{}</p>", escape(text));
}

fn render_toasts(html: &mut String, view: &ViewModel) {
    if view.toasts.is_empty() {
        return;
    }
    html.push_str("<div class=\"toasts\">");
    for toast in &view.toasts {
        let class = match toast.kind {
            ToastKind::Info => "toast",
            ToastKind::Error => "toast error",
        };
        let _ = write!(
            html,
            "<div class=\"{}\" role=\"status\">{}</div>",
            class,
            escape(&toast.message)
        );
    }
    html.push_str("</div>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    fn overlay(trailer: TrailerState) -> OverlayView {
        OverlayView {
            id: 1,
            media_type: MediaKind::Movie,
            title: "Tom & Jerry".to_string(),
            overview: String::new(),
            trailer,
            muted: true,
            in_list: false,
            list_pending: false,
            list_error: None,
            genres: "Comedy".to_string(),
            language: "Unknown".to_string(),
            match_percent: "70.00".to_string(),
            date: None,
            vote_count: 3,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn embed_url_carries_mute_flag() {
        assert_eq!(
            trailer_embed_url("abc123", true),
            "https://www.youtube.com/embed/abc123?autoplay=1&mute=1"
        );
        assert!(trailer_embed_url("abc123", false).ends_with("mute=0"));
    }

    #[test]
    fn unavailable_and_failed_read_differently() {
        let mut a = String::new();
        render_overlay(&mut a, &overlay(TrailerState::Unavailable));
        let mut b = String::new();
        render_overlay(
            &mut b,
            &overlay(TrailerState::Failed {
                reason: "boom".to_string(),
            }),
        );
        assert!(a.contains("no trailer is available"));
        assert!(b.contains("could not be loaded"));
        assert!(a.contains("Tom &amp; Jerry"));
    }

    #[test]
    fn empty_page_renders() {
        let html = render_page(&ViewModel::default());
        assert!(html.contains("class=\"banner\""));
        assert!(!html.contains("role=\"dialog\""));
    }
}
