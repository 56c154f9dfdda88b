//! Reading fields, links and forms out of static HTML.
//!
//! `scraper::Html` is not `Send`, so documents are parsed and dropped within
//! these synchronous helpers and never held across an await point.

use mi_crawler::{Element, Locator, SessionError};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const FIELDS: &str = "input, textarea, select, button";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Submission {
    pub method: Method,
    pub action: Url,
    pub fields: Vec<(String, String)>,
}

/// What clicking an element amounts to without running scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClickAction {
    Follow(Url),
    Submit(Submission),
}

fn selector(locator: &str) -> Result<Selector, SessionError> {
    Selector::parse(locator).map_err(|_| SessionError::InvalidLocator(locator.to_string()))
}

/// Name under which a field addressed by `name` or `id` is submitted.
pub(crate) fn field_name(html: &str, name_or_id: &str) -> Result<String, SessionError> {
    let doc = Html::parse_document(html);
    let fields = selector(FIELDS)?;
    let field = doc
        .select(&fields)
        .find(|f| f.value().attr("name") == Some(name_or_id) || f.value().id() == Some(name_or_id))
        .ok_or_else(|| SessionError::ElementNotFound(name_or_id.to_string()))?;
    Ok(field.value().attr("name").unwrap_or(name_or_id).to_string())
}

pub(crate) fn find(
    html: &str,
    locator: &Locator,
    visible: bool,
) -> Result<Option<Element>, SessionError> {
    let doc = Html::parse_document(html);
    let sel = selector(locator.as_str())?;
    let found = doc
        .select(&sel)
        .find(|elem| !visible || !is_hidden(*elem))
        .map(|elem| Element {
            text: elem.text().collect::<String>().trim().to_string(),
        });
    Ok(found)
}

pub(crate) fn click_action(
    page: &Url,
    html: &str,
    locator: &Locator,
    filled: &[(String, String)],
) -> Result<ClickAction, SessionError> {
    let doc = Html::parse_document(html);
    let sel = selector(locator.as_str())?;
    let target = doc
        .select(&sel)
        .next()
        .ok_or_else(|| SessionError::ElementNotFound(locator.to_string()))?;

    if let Some(href) = link_of(target) {
        let url = page.join(href).map_err(|e| SessionError::Navigation {
            url: href.to_string(),
            reason: e.to_string(),
        })?;
        return Ok(ClickAction::Follow(url));
    }

    let form = target
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "form")
        .filter(|_| is_submitter(target))
        .ok_or_else(|| SessionError::NotClickable(locator.to_string()))?;

    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => Method::Post,
        _ => Method::Get,
    };
    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => {
            page.join(action).map_err(|e| SessionError::Navigation {
                url: action.to_string(),
                reason: e.to_string(),
            })?
        }
        _ => page.clone(),
    };

    let mut fields = form_fields(form, target)?;
    for (name, value) in filled {
        match fields.iter_mut().find(|(n, _)| n == name) {
            Some(field) => field.1 = value.clone(),
            None => fields.push((name.clone(), value.clone())),
        }
    }

    Ok(ClickAction::Submit(Submission {
        method,
        action,
        fields,
    }))
}

/// The `href` of the element or of the link enclosing it.
fn link_of(elem: ElementRef<'_>) -> Option<&str> {
    std::iter::once(elem)
        .chain(elem.ancestors().filter_map(ElementRef::wrap))
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

fn is_submitter(elem: ElementRef<'_>) -> bool {
    let kind = elem.value().attr("type").unwrap_or_default();
    match elem.value().name() {
        "button" => kind.is_empty() || kind.eq_ignore_ascii_case("submit"),
        "input" => kind.eq_ignore_ascii_case("submit") || kind.eq_ignore_ascii_case("image"),
        _ => false,
    }
}

/// Successful controls of `form` when submitted by `submitter`.
fn form_fields(
    form: ElementRef<'_>,
    submitter: ElementRef<'_>,
) -> Result<Vec<(String, String)>, SessionError> {
    let controls = selector(FIELDS)?;
    let options = selector("option")?;
    let mut fields = Vec::new();

    for control in form.select(&controls) {
        let elem = control.value();
        let Some(name) = elem.attr("name") else {
            continue;
        };
        if elem.attr("disabled").is_some() {
            continue;
        }
        let kind = elem.attr("type").unwrap_or_default().to_ascii_lowercase();
        let value = match elem.name() {
            "textarea" => control.text().collect::<String>(),
            "select" => {
                let chosen = control
                    .select(&options)
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| control.select(&options).next());
                match chosen {
                    Some(o) => o
                        .value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| o.text().collect::<String>().trim().to_string()),
                    None => continue,
                }
            }
            "button" => {
                if control.id() != submitter.id() {
                    continue;
                }
                elem.attr("value").unwrap_or_default().to_string()
            }
            _ => match kind.as_str() {
                "submit" | "image" | "reset" | "button" if control.id() != submitter.id() => {
                    continue
                }
                "reset" | "button" | "file" => continue,
                "checkbox" | "radio" if elem.attr("checked").is_none() => continue,
                "checkbox" | "radio" => elem.attr("value").unwrap_or("on").to_string(),
                _ => elem.attr("value").unwrap_or_default().to_string(),
            },
        };
        fields.push((name.to_string(), value));
    }
    Ok(fields)
}

fn is_hidden(elem: ElementRef<'_>) -> bool {
    std::iter::once(elem)
        .chain(elem.ancestors().filter_map(ElementRef::wrap))
        .any(|e| {
            let v = e.value();
            let hidden_input = v.name() == "input"
                && v.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
            let no_display = v.attr("style").is_some_and(|s| {
                s.chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase()
                    .contains("display:none")
            });
            hidden_input || no_display || v.attr("hidden").is_some()
        })
}
