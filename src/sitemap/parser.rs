use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
}

/// A sitemap file is either an index of other sitemaps or a list of pages.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    Index(Vec<SitemapEntry>),
    UrlSet(Vec<SitemapEntry>),
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Loc,
    LastMod,
}

pub fn parse_sitemap(xml: &[u8]) -> Result<SitemapDocument> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut is_index = false;
    let mut entries = Vec::new();

    let mut depth = 0usize;
    let mut entry_depth: Option<usize> = None;
    let mut field: Option<Field> = None;
    let mut loc = String::new();
    let mut lastmod = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                // only direct children of <url>/<sitemap>, not e.g. <image:loc>
                let child_of_entry = entry_depth.map_or(false, |d| depth == d + 1);
                match e.local_name().as_ref() {
                    b"sitemapindex" => is_index = true,
                    b"url" | b"sitemap" if entry_depth.is_none() => {
                        entry_depth = Some(depth);
                        loc.clear();
                        lastmod.clear();
                    }
                    b"loc" if child_of_entry => field = Some(Field::Loc),
                    b"lastmod" if child_of_entry => field = Some(Field::LastMod),
                    _ => {}
                }
            }
            Event::End(e) => {
                let closes_entry = entry_depth == Some(depth);
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"url" | b"sitemap" if closes_entry => {
                        entry_depth = None;
                        let location = loc.trim();
                        if !location.is_empty() {
                            entries.push(SitemapEntry {
                                loc: location.to_string(),
                                lastmod: parse_lastmod(lastmod.trim()),
                            });
                        }
                    }
                    b"loc" | b"lastmod" => field = None,
                    _ => {}
                }
            }
            Event::Text(t) => {
                let raw = String::from_utf8_lossy(&t);
                let text = escape::unescape(&raw)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| raw.to_string());
                push_text(field, &mut loc, &mut lastmod, &text);
            }
            Event::CData(t) => {
                push_text(field, &mut loc, &mut lastmod, &String::from_utf8_lossy(&t));
            }
            Event::GeneralRef(r) => {
                let entity = format!("&{};", String::from_utf8_lossy(&r));
                if let Ok(text) = escape::unescape(&entity) {
                    push_text(field, &mut loc, &mut lastmod, &text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(if is_index {
        SitemapDocument::Index(entries)
    } else {
        SitemapDocument::UrlSet(entries)
    })
}

fn push_text(field: Option<Field>, loc: &mut String, lastmod: &mut String, text: &str) {
    match field {
        Some(Field::Loc) => loc.push_str(text),
        Some(Field::LastMod) => lastmod.push_str(text),
        None => {}
    }
}

/// W3C datetime, in any of the precisions sitemaps use.
pub fn parse_lastmod(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Minutes without seconds (e.g., "2024-10-01T12:30+02:00")
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_sitemap_index() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <sitemap>
                <loc>https://www.example.com/post-sitemap.xml</loc>
                <lastmod>2024-11-02T08:00:00+00:00</lastmod>
              </sitemap>
              <sitemap>
                <loc>https://www.example.com/page-sitemap.xml</loc>
              </sitemap>
            </sitemapindex>"#;

        let doc = parse_sitemap(xml).unwrap();
        let SitemapDocument::Index(entries) = doc else {
            panic!("expected an index");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].loc, "https://www.example.com/page-sitemap.xml");
        assert!(entries[1].lastmod.is_none());
    }

    #[test]
    fn test_parse_urlset_with_entities() {
        let xml = br#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
              <url>
                <loc>https://www.example.com/search?a=1&amp;b=2</loc>
                <lastmod>2024-10-01</lastmod>
                <image:image><image:loc>https://www.example.com/img.png</image:loc></image:image>
              </url>
              <url><loc><![CDATA[https://www.example.com/about/]]></loc></url>
            </urlset>"#;

        let doc = parse_sitemap(xml).unwrap();
        let SitemapDocument::UrlSet(entries) = doc else {
            panic!("expected a urlset");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].loc, "https://www.example.com/search?a=1&b=2");
        assert_eq!(
            entries[0].lastmod,
            Some(Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(entries[1].loc, "https://www.example.com/about/");
    }

    #[test]
    fn test_lastmod_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 10, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_lastmod("2024-10-01T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_lastmod("2024-10-01T12:30+02:00"), Some(expected));
        assert_eq!(parse_lastmod("not a date"), None);
        assert_eq!(parse_lastmod(""), None);
    }
}
