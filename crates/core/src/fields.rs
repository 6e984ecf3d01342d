//! Per-category listing fields and subcategories.
//!
//! This module provides:
//! - Typed field descriptors (name, label, input kind, options)
//! - A registry mapping a category id to its ordered field set
//! - Subcategory lists used by the posting form and the category browser

#![forbid(unsafe_code)]

use serde::Serialize;
use smallvec::SmallVec;

use crate::catalog::{ELECTRONICS, FURNITURE, JOBS, REAL_ESTATE, SERVICES, VEHICLES};
use crate::{CategoryId, CategoryMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Number,
    Select,
    Checkbox,
    Date,
    TextArea,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub input: InputKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<SmallVec<[&'static str; 8]>>,
}

/// Category with its subcategories and ordered field set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategorySpec {
    pub id: CategoryId,
    pub subcategories: Vec<&'static str>,
    pub fields: Vec<FieldDescriptor>,
}

fn field(name: &'static str, label: &'static str, input: InputKind) -> FieldDescriptor {
    FieldDescriptor { name, label, input, options: None }
}

fn select(name: &'static str, label: &'static str, options: &[&'static str]) -> FieldDescriptor {
    FieldDescriptor { name, label, input: InputKind::Select, options: Some(options.iter().copied().collect()) }
}

/// Return the full field set for a category, common fields first.
/// Unknown categories get only the common fields.
pub fn fields_for(category: &str) -> Vec<FieldDescriptor> {
    let mut fields = vec![
        field("title", "Title", InputKind::Text),
        field("price", "Price", InputKind::Number),
        field("description", "Description", InputKind::TextArea),
    ];

    match category {
        VEHICLES => {
            fields.push(field("make", "Make", InputKind::Text));
            fields.push(field("model", "Model", InputKind::Text));
            fields.push(field("year", "Year", InputKind::Number));
            fields.push(field("mileage", "Mileage (km)", InputKind::Number));
            fields.push(select("fuel", "Fuel", &["Petrol", "Diesel", "Hybrid", "Electric"]));
            fields.push(select("transmission", "Transmission", &["Manual", "Automatic"]));
        }
        REAL_ESTATE => {
            fields.push(select("listing_type", "Listing type", &["For sale", "For rent"]));
            fields.push(field("bedrooms", "Bedrooms", InputKind::Number));
            fields.push(field("bathrooms", "Bathrooms", InputKind::Number));
            fields.push(field("area", "Area (m²)", InputKind::Number));
            fields.push(field("furnished", "Furnished", InputKind::Checkbox));
        }
        ELECTRONICS => {
            fields.push(field("brand", "Brand", InputKind::Text));
            fields.push(select("condition", "Condition", &["New", "Used", "Refurbished"]));
            fields.push(field("warranty", "Under warranty", InputKind::Checkbox));
        }
        SERVICES => {
            fields.push(select("pricing", "Pricing", &["Fixed", "Hourly", "Negotiable"]));
            fields.push(field("available_from", "Available from", InputKind::Date));
        }
        JOBS => {
            fields.push(select("employment", "Employment type", &["Full-time", "Part-time", "Contract", "Internship"]));
            fields.push(field("company", "Company", InputKind::Text));
            fields.push(field("remote", "Remote", InputKind::Checkbox));
            fields.push(field("deadline", "Application deadline", InputKind::Date));
        }
        FURNITURE => {
            fields.push(select("condition", "Condition", &["New", "Used"]));
            fields.push(field("material", "Material", InputKind::Text));
        }
        _ => {}
    }
    fields
}

pub fn subcategories_for(category: &str) -> &'static [&'static str] {
    match category {
        VEHICLES => &["Cars", "Motorcycles", "Trucks & Vans", "Buses", "Parts & Accessories"],
        REAL_ESTATE => &["Houses", "Apartments", "Land", "Commercial", "Short Let"],
        ELECTRONICS => &["Phones", "Laptops & Computers", "TV & Audio", "Cameras", "Accessories"],
        SERVICES => &["Home Repair", "Cleaning", "Moving", "Tutoring", "Care"],
        JOBS => &["Engineering", "Driving", "Healthcare", "Finance", "Hospitality"],
        FURNITURE => &["Living Room", "Bedroom", "Office", "Outdoor"],
        _ => &[],
    }
}

/// Category browser view for every category in the map, in first-seen order.
pub fn catalogue(map: &CategoryMap) -> Vec<CategorySpec> {
    map.categories()
        .into_iter()
        .map(|id| {
            let subcategories = subcategories_for(id.as_str()).to_vec();
            let fields = fields_for(id.as_str());
            CategorySpec { id, subcategories, fields }
        })
        .collect()
}
