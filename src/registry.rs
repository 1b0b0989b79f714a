//! Doctype schemas and whitelisted methods known to the editor.
//!
//! The registry is populated at startup with the Studio doctypes and can be
//! extended from a JSON file listing further doctypes.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::context::{
    STUDIO_APP, STUDIO_PAGE, STUDIO_PAGE_VARIABLE, STUDIO_PAGE_WATCHER, STUDIO_RESOURCE,
};
use crate::error::StudioError;

/// Field types that hold no value of their own.
pub const NO_VALUE_FIELDS: &[&str] = &[
    "Section Break",
    "Column Break",
    "Tab Break",
    "HTML",
    "Table",
    "Table MultiSelect",
    "Button",
    "Image",
    "Fold",
    "Heading",
];

/// Field types that only affect form layout.
pub const DISPLAY_FIELDTYPES: &[&str] = &[
    "Section Break",
    "Column Break",
    "Tab Break",
    "HTML",
    "Button",
    "Image",
    "Fold",
    "Heading",
];

/// Child-table field types. These are kept even though they hold no value.
pub const TABLE_FIELDS: &[&str] = &["Table", "Table MultiSelect"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocField {
    pub fieldname: String,
    pub fieldtype: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub options: Option<String>,
    #[serde(default)]
    pub reqd: bool,
}

impl DocField {
    pub fn new(fieldname: &str, fieldtype: &str, label: &str) -> Self {
        Self {
            fieldname: fieldname.to_string(),
            fieldtype: fieldtype.to_string(),
            label: Some(label.to_string()),
            options: None,
            reqd: false,
        }
    }

    pub fn options(mut self, options: &str) -> Self {
        self.options = Some(options.to_string());
        self
    }

    pub fn reqd(mut self) -> Self {
        self.reqd = true;
        self
    }

    /// Whether the field carries data a page can bind to.
    pub fn is_data_field(&self) -> bool {
        let fieldtype = self.fieldtype.as_str();
        let layout_only = NO_VALUE_FIELDS.contains(&fieldtype) || DISPLAY_FIELDTYPES.contains(&fieldtype);
        !layout_only || TABLE_FIELDS.contains(&fieldtype)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocTypeDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<DocField>,
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocTypeRegistry {
    doctypes: BTreeMap<String, DocTypeDef>,
}

impl DocTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Studio doctypes themselves.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register(DocTypeDef {
            name: STUDIO_APP.to_string(),
            fields: vec![
                DocField::new("app_title", "Data", "App Title").reqd(),
                DocField::new("app_name", "Data", "App Name"),
                DocField::new("route", "Data", "Route").reqd(),
                DocField::new("column_break_1", "Column Break", ""),
                DocField::new("app_home", "Link", "App Home").options(STUDIO_PAGE),
                DocField::new("published", "Check", "Published"),
            ],
            methods: vec!["generate_app_build".to_string()],
        });

        registry.register(DocTypeDef {
            name: STUDIO_PAGE.to_string(),
            fields: vec![
                DocField::new("page_title", "Data", "Title"),
                DocField::new("studio_app", "Link", "Studio App").options(STUDIO_APP).reqd(),
                DocField::new("page_name", "Data", "Page Name"),
                DocField::new("route", "Data", "Route"),
                DocField::new("published", "Check", "Published"),
                DocField::new("section_break_blocks", "Section Break", "Blocks"),
                DocField::new("blocks", "JSON", "Blocks"),
                DocField::new("draft_blocks", "JSON", "Draft Blocks"),
                DocField::new("variables", "Table", "Variables").options(STUDIO_PAGE_VARIABLE),
                DocField::new("resources", "Table MultiSelect", "Data Sources")
                    .options(STUDIO_RESOURCE),
                DocField::new("watchers", "Table", "Watchers").options(STUDIO_PAGE_WATCHER),
                DocField::new("client_scripts", "Table MultiSelect", "Client Scripts"),
            ],
            methods: vec!["publish".to_string()],
        });

        registry.register(DocTypeDef {
            name: STUDIO_PAGE_VARIABLE.to_string(),
            fields: vec![
                DocField::new("variable_name", "Data", "Variable Name").reqd(),
                DocField::new("variable_type", "Select", "Variable Type")
                    .options("String\nNumber\nBoolean\nObject"),
                DocField::new("initial_value", "Code", "Initial Value"),
            ],
            methods: Vec::new(),
        });

        registry.register(DocTypeDef {
            name: STUDIO_PAGE_WATCHER.to_string(),
            fields: vec![
                DocField::new("source", "Data", "Source").reqd(),
                DocField::new("script", "Code", "Script").reqd(),
                DocField::new("immediate", "Check", "Immediate"),
            ],
            methods: Vec::new(),
        });

        registry.register(DocTypeDef {
            name: STUDIO_RESOURCE.to_string(),
            fields: vec![
                DocField::new("resource_name", "Data", "Data Source Name").reqd(),
                DocField::new("resource_type", "Select", "Type")
                    .options("Document List\nDocument\nAPI Resource"),
                DocField::new("document_type", "Link", "Document Type").options("DocType"),
                DocField::new("document_name", "Dynamic Link", "Document Name")
                    .options("document_type"),
                DocField::new("fetch_document_using_filters", "Check", "Fetch Document Using Filters"),
                DocField::new("fields", "JSON", "Fields"),
                DocField::new("filters", "JSON", "Filters"),
                DocField::new("limit", "Int", "Limit"),
                DocField::new("section_break_api", "Section Break", "API"),
                DocField::new("method", "Select", "Method").options("GET\nPOST\nPUT\nDELETE"),
                DocField::new("url", "Data", "URL"),
                DocField::new("transform_results", "Check", "Transform Results"),
                DocField::new("transform", "Code", "Transform"),
                DocField::new("whitelisted_methods", "JSON", "Whitelisted Methods"),
            ],
            methods: Vec::new(),
        });

        registry
    }

    /// Adds or replaces a doctype.
    pub fn register(&mut self, doctype: DocTypeDef) {
        self.doctypes.insert(doctype.name.clone(), doctype);
    }

    /// Registers every doctype listed in a JSON file (an array of doctypes).
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read doctypes file {}", path.display()))?;
        let doctypes: Vec<DocTypeDef> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse doctypes file {}", path.display()))?;

        let count = doctypes.len();
        for doctype in doctypes {
            self.register(doctype);
        }
        tracing::info!("Registered {} doctypes from {}", count, path.display());
        Ok(count)
    }

    pub fn contains(&self, doctype: &str) -> bool {
        self.doctypes.contains_key(doctype)
    }

    /// Fields a page can bind to, with a `name` field appended if the doctype
    /// declares none.
    pub fn get_doctype_fields(&self, doctype: &str) -> Result<Vec<DocField>, StudioError> {
        let def = self.lookup(doctype)?;

        let mut fields = def.fields.clone();
        if !fields.iter().any(|f| f.fieldname == "name") {
            fields.push(DocField::new("name", "Data", "ID"));
        }
        fields.retain(DocField::is_data_field);
        Ok(fields)
    }

    pub fn get_whitelisted_methods(&self, doctype: &str) -> Result<Vec<String>, StudioError> {
        Ok(self.lookup(doctype)?.methods.clone())
    }

    fn lookup(&self, doctype: &str) -> Result<&DocTypeDef, StudioError> {
        self.doctypes
            .get(doctype)
            .ok_or_else(|| StudioError::not_found("DocType", doctype))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fieldnames(fields: &[DocField]) -> Vec<&str> {
        fields.iter().map(|f| f.fieldname.as_str()).collect()
    }

    #[test]
    fn drops_layout_fields_but_keeps_tables() {
        let registry = DocTypeRegistry::builtin();
        let fields = registry.get_doctype_fields(STUDIO_PAGE).unwrap();
        let names = fieldnames(&fields);

        assert!(!names.contains(&"section_break_blocks"));
        assert!(names.contains(&"variables"));
        assert!(names.contains(&"resources"));
        assert!(names.contains(&"watchers"));
        assert!(names.contains(&"client_scripts"));
        assert_eq!(names.last(), Some(&"name"));
    }

    #[test]
    fn keeps_declared_name_field() {
        let mut registry = DocTypeRegistry::new();
        registry.register(DocTypeDef {
            name: "ToDo".into(),
            fields: vec![
                DocField::new("name", "Data", "Todo ID"),
                DocField::new("status", "Select", "Status"),
                DocField::new("sb", "Section Break", ""),
                DocField::new("notes", "HTML", ""),
            ],
            methods: vec![],
        });

        let fields = registry.get_doctype_fields("ToDo").unwrap();
        assert_eq!(fieldnames(&fields), vec!["name", "status"]);
        assert_eq!(fields[0].label.as_deref(), Some("Todo ID"));
    }

    #[test]
    fn unknown_doctype_is_not_found() {
        let registry = DocTypeRegistry::builtin();
        assert!(matches!(
            registry.get_doctype_fields("Nope"),
            Err(StudioError::NotFound { .. })
        ));
        assert!(registry.get_whitelisted_methods("Nope").is_err());
    }

    #[test]
    fn lists_whitelisted_methods() {
        let registry = DocTypeRegistry::builtin();
        assert_eq!(
            registry.get_whitelisted_methods(STUDIO_APP).unwrap(),
            vec!["generate_app_build"]
        );
        assert!(registry.get_whitelisted_methods(STUDIO_RESOURCE).unwrap().is_empty());
    }

    #[test]
    fn loads_doctypes_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "ToDo", "fields": [{{"fieldname": "status", "fieldtype": "Select"}}], "methods": ["close"]}}]"#
        )
        .unwrap();

        let mut registry = DocTypeRegistry::builtin();
        assert_eq!(registry.load_file(file.path()).unwrap(), 1);
        assert!(registry.contains("ToDo"));
        assert_eq!(registry.get_whitelisted_methods("ToDo").unwrap(), vec!["close"]);
        assert_eq!(
            fieldnames(&registry.get_doctype_fields("ToDo").unwrap()),
            vec!["status", "name"]
        );
    }
}
