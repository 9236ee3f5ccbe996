//! Builder patterns for creating test documents programmatically.

#![allow(dead_code)]

use serde_json::{json, Map, Value};

/// Builder for `{business_id, skills: [...]}` documents.
pub struct SkillDocBuilder {
    business_id: Option<String>,
    skills: Vec<Value>,
}

impl SkillDocBuilder {
    pub fn new(business_id: &str) -> Self {
        Self {
            business_id: Some(business_id.to_string()),
            skills: Vec::new(),
        }
    }

    /// A document without a `business_id`.
    pub fn anonymous() -> Self {
        Self {
            business_id: None,
            skills: Vec::new(),
        }
    }

    pub fn skill(mut self, name: &str, category: &str) -> Self {
        self.skills.push(json!({ "name": name, "category": category }));
        self
    }

    pub fn uncategorized(mut self, name: &str) -> Self {
        self.skills.push(json!({ "name": name }));
        self
    }

    pub fn rated(mut self, name: &str, category: &str, level: &str, certified: bool) -> Self {
        self.skills.push(json!({
            "name": name,
            "category": category,
            "level": level,
            "certified": certified,
        }));
        self
    }

    pub fn raw(mut self, entry: Value) -> Self {
        self.skills.push(entry);
        self
    }

    pub fn build(self) -> Value {
        let mut doc = Map::new();
        if let Some(business_id) = self.business_id {
            doc.insert("business_id".to_string(), Value::String(business_id));
        }
        doc.insert("skills".to_string(), Value::Array(self.skills));
        Value::Object(doc)
    }
}

/// Builder for full employee profile documents.
pub struct ProfileBuilder {
    fields: Map<String, Value>,
    departments: Vec<Value>,
    skills: Vec<Value>,
}

impl ProfileBuilder {
    pub fn new(english_name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("english_name".to_string(), json!(english_name));
        Self {
            fields,
            departments: Vec::new(),
            skills: Vec::new(),
        }
    }

    pub fn business_id(mut self, business_id: &str) -> Self {
        self.fields.insert("business_id".to_string(), json!(business_id));
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.fields.insert("email".to_string(), json!(email));
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.fields.insert("notes".to_string(), json!(notes));
        self
    }

    pub fn department(mut self, name: &str) -> Self {
        self.departments.push(json!(name));
        self
    }

    pub fn directs(mut self, name: &str, parent: &str) -> Self {
        self.departments
            .push(json!({ "name": name, "is_director": true, "parent": parent }));
        self
    }

    pub fn skill(mut self, name: &str, category: &str) -> Self {
        self.skills.push(json!({ "name": name, "category": category }));
        self
    }

    pub fn build(self) -> Value {
        let mut doc = self.fields;
        doc.insert("departments".to_string(), Value::Array(self.departments));
        doc.insert("skills".to_string(), Value::Array(self.skills));
        Value::Object(doc)
    }
}

/// `{employees: [...]}` batch of profiles.
pub fn batch(profiles: Vec<Value>) -> Value {
    json!({ "employees": profiles })
}

/// A one-page PDF whose content stream shows `text`.
pub fn pdf_with_text(text: &str) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let stream = format!("BT /F1 11 Tf 72 720 Td ({}) Tj ET", text);
    let content_id = doc.add_object(Stream::new(dictionary! {}, stream.into_bytes()));

    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
