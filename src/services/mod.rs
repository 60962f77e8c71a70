mod airtable;
mod case_studies;

pub use airtable::{
    fields_from_remixable, json_type_name, remixable_from_fields, video_url_formula, AirtableClient,
};
pub use case_studies::{extract_case_study, extract_example_link, is_video_link, CaseStudy};
