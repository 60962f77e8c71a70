use serde_json::{Map, Value};
use url::Url;

use crate::ai::{remix_content, ChatModel};
use crate::db::Repository;
use crate::error::Result;
use crate::models::{NewRemixable, Remixable};
use crate::services::{
    extract_case_study, extract_example_link, fields_from_remixable, is_video_link, json_type_name,
    remixable_from_fields, video_url_formula, AirtableClient, CaseStudy,
};
use crate::sitemap::SiteCrawler;

/// Walk the case-study index pages listed in a sitemap and store the
/// examples they link to. Returns the Remixable count afterwards.
pub async fn crawl_llm_examples(
    repository: &Repository,
    crawler: &SiteCrawler,
    sitemap_url: &str,
    path_filter: &str,
) -> Result<i64> {
    tracing::info!("Starting to crawl LLM examples");

    let entries = crawler.sitemap_entries(sitemap_url).await?;
    let index_pages: Vec<_> = entries
        .into_iter()
        .filter(|e| e.loc.contains(path_filter))
        .collect();
    tracing::info!("{} example pages in sitemap", index_pages.len());

    for page in index_pages {
        let html = match crawler.fetch_text(&page.loc).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Error processing {}: {}", page.loc, e);
                continue;
            }
        };

        let Some(link) = extract_example_link(&html) else {
            tracing::warn!("No llm-link found on {}", page.loc);
            continue;
        };
        let example_url = resolve_link(&page.loc, &link);
        tracing::debug!("{} -> {}", page.loc, example_url);

        let stored = if is_video_link(&example_url) {
            repository
                .get_or_create_remixable(NewRemixable {
                    url: example_url.clone(),
                    is_video: true,
                    ..Default::default()
                })
                .await
                .map(|_| ())
        } else {
            let study = match crawler.fetch_text(&example_url).await {
                Ok(html) => extract_case_study(&html),
                Err(e) => {
                    tracing::warn!("Error processing {}: {}", example_url, e);
                    continue;
                }
            };
            let Some(study) = study else {
                tracing::warn!("No og:title on {}", example_url);
                continue;
            };
            store_case_study(repository, &example_url, study)
                .await
                .map(|_| ())
        };

        if let Err(e) = stored {
            tracing::error!("Error saving remixable {}: {}", example_url, e);
        }
    }

    let count = repository.count_remixables().await?;
    tracing::info!("Finished crawling LLM examples");
    tracing::info!("{} remixables now in db", count);
    Ok(count)
}

fn resolve_link(page_url: &str, link: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(link))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| link.to_string())
}

/// Get-or-create the Remixable for a case study and attach its images.
pub async fn store_case_study(
    repository: &Repository,
    url: &str,
    study: CaseStudy,
) -> Result<Remixable> {
    let (remixable, _) = repository
        .get_or_create_remixable(NewRemixable {
            url: url.to_string(),
            title: Some(study.title),
            markdown_content: Some(study.markdown_content),
            is_video: false,
            remixed_as: None,
        })
        .await?;

    for image_url in study.image_urls {
        repository.add_remixable_image(remixable.id, image_url).await?;
    }

    Ok(remixable)
}

/// Rewrite every Remixable that has content but no post yet.
pub async fn generate_posts_for_all_remixables(
    repository: &Repository,
    writer: &impl ChatModel,
) -> Result<usize> {
    let pending = repository.remixables_pending_remix().await?;
    tracing::info!("{} remixables waiting for a post", pending.len());

    let mut remixed = 0;
    for remixable in &pending {
        let result = match remix_content(writer, remixable).await {
            Ok(text) => repository.set_remixed_as(remixable.id, text).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => remixed += 1,
            Err(e) => tracing::error!("Error remixing {}: {}", remixable.url, e),
        }
    }

    tracing::info!("Remixed {} of {}", remixed, pending.len());
    Ok(remixed)
}

/// Field names and JSON types of the first record in the table.
pub async fn airtable_schema(airtable: &AirtableClient) -> Result<Option<Vec<(String, &'static str)>>> {
    let records = airtable.list_records(None, Some(1)).await?;
    Ok(records.into_iter().next().map(|record| {
        record
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), json_type_name(value)))
            .collect()
    }))
}

/// Pull every Airtable record into Remixables. Returns how many records
/// were imported.
pub async fn sync_airtable_remixables(
    repository: &Repository,
    airtable: &AirtableClient,
) -> Result<usize> {
    let records = airtable.list_records(None, None).await?;
    tracing::info!("Found {} records in Airtable", records.len());

    let mut imported = 0;
    for record in &records {
        match import_airtable_record(repository, &record.fields).await {
            Ok(Some((remixable, created))) => {
                imported += 1;
                tracing::info!(
                    "{} remixable: {}",
                    if created { "Created" } else { "Updated" },
                    remixable.url
                );
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Error processing record {}: {}", record.id, e),
        }
    }

    Ok(imported)
}

/// Create or refresh the Remixable for one record. Records without a
/// `video_url` are ignored.
pub async fn import_airtable_record(
    repository: &Repository,
    fields: &Map<String, Value>,
) -> Result<Option<(Remixable, bool)>> {
    let Some((new, images)) = remixable_from_fields(fields) else {
        return Ok(None);
    };

    let title = new.title.clone();
    let markdown_content = new.markdown_content.clone();
    let remixed_as = new.remixed_as.clone();

    let (mut remixable, created) = repository.get_or_create_remixable(new).await?;
    if !created {
        repository
            .update_remixable(remixable.id, title.clone(), markdown_content.clone(), remixed_as.clone())
            .await?;
        remixable.title = title;
        remixable.markdown_content = markdown_content;
        remixable.remixed_as = remixed_as;
    }

    for image_url in images {
        repository.add_remixable_image(remixable.id, image_url).await?;
    }

    Ok(Some((remixable, created)))
}

/// Push remixed content to Airtable, updating the record with the same
/// `video_url` or creating one. Returns how many records were written.
pub async fn sync_remixables_to_airtable(
    repository: &Repository,
    airtable: &AirtableClient,
) -> Result<usize> {
    let remixables = repository.remixables_with_remix().await?;
    tracing::info!("Found {} remixables with remixed content", remixables.len());

    let mut synced = 0;
    for remixable in &remixables {
        match push_remixable(repository, airtable, remixable).await {
            Ok(action) => {
                synced += 1;
                tracing::info!("{} Airtable record for: {}", action, remixable.url);
            }
            Err(e) => {
                tracing::error!("Error syncing remixable {} to Airtable: {}", remixable.url, e);
            }
        }
    }

    tracing::info!("Finished syncing remixables to Airtable");
    Ok(synced)
}

async fn push_remixable(
    repository: &Repository,
    airtable: &AirtableClient,
    remixable: &Remixable,
) -> Result<&'static str> {
    let images = repository.remixable_images(remixable.id).await?;
    let fields = fields_from_remixable(remixable, &images);

    let existing = airtable
        .list_records(Some(&video_url_formula(&remixable.url)), Some(1))
        .await?;
    match existing.first() {
        Some(record) => {
            airtable.update_record(&record.id, &fields).await?;
            Ok("Updated")
        }
        None => {
            airtable.create_record(&fields).await?;
            Ok("Created new")
        }
    }
}
