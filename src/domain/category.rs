use std::fmt;

use serde_json::{Map, Value};

/// Base field kinds understood by the engine and the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    TextField,
    TextArea,
    Number,
    Password,
    Email,
    Url,
    PhoneNumber,
    Currency,
    Checkbox,
    SelectBoxes,
    Select,
    Radio,
    DateTime,
    Day,
    Time,
    Tags,
    Signature,
    File,
    Button,
    Content,
    HtmlElement,
    DataGrid,
    EditGrid,
    Container,
    Panel,
    FieldSet,
    Columns,
    Table,
    Tabs,
    Wizard,
    Pdf,
    Builder,
}

impl FieldCategory {
    pub const ALL: [FieldCategory; 32] = [
        FieldCategory::TextField,
        FieldCategory::TextArea,
        FieldCategory::Number,
        FieldCategory::Password,
        FieldCategory::Email,
        FieldCategory::Url,
        FieldCategory::PhoneNumber,
        FieldCategory::Currency,
        FieldCategory::Checkbox,
        FieldCategory::SelectBoxes,
        FieldCategory::Select,
        FieldCategory::Radio,
        FieldCategory::DateTime,
        FieldCategory::Day,
        FieldCategory::Time,
        FieldCategory::Tags,
        FieldCategory::Signature,
        FieldCategory::File,
        FieldCategory::Button,
        FieldCategory::Content,
        FieldCategory::HtmlElement,
        FieldCategory::DataGrid,
        FieldCategory::EditGrid,
        FieldCategory::Container,
        FieldCategory::Panel,
        FieldCategory::FieldSet,
        FieldCategory::Columns,
        FieldCategory::Table,
        FieldCategory::Tabs,
        FieldCategory::Wizard,
        FieldCategory::Pdf,
        FieldCategory::Builder,
    ];

    /// Name under which the category is registered in the component catalog.
    pub fn type_name(self) -> &'static str {
        match self {
            FieldCategory::TextField => "textfield",
            FieldCategory::TextArea => "textarea",
            FieldCategory::Number => "number",
            FieldCategory::Password => "password",
            FieldCategory::Email => "email",
            FieldCategory::Url => "url",
            FieldCategory::PhoneNumber => "phoneNumber",
            FieldCategory::Currency => "currency",
            FieldCategory::Checkbox => "checkbox",
            FieldCategory::SelectBoxes => "selectboxes",
            FieldCategory::Select => "select",
            FieldCategory::Radio => "radio",
            FieldCategory::DateTime => "datetime",
            FieldCategory::Day => "day",
            FieldCategory::Time => "time",
            FieldCategory::Tags => "tags",
            FieldCategory::Signature => "signature",
            FieldCategory::File => "file",
            FieldCategory::Button => "button",
            FieldCategory::Content => "content",
            FieldCategory::HtmlElement => "htmlelement",
            FieldCategory::DataGrid => "datagrid",
            FieldCategory::EditGrid => "editgrid",
            FieldCategory::Container => "container",
            FieldCategory::Panel => "panel",
            FieldCategory::FieldSet => "fieldset",
            FieldCategory::Columns => "columns",
            FieldCategory::Table => "table",
            FieldCategory::Tabs => "tabs",
            FieldCategory::Wizard => "wizard",
            FieldCategory::Pdf => "pdf",
            FieldCategory::Builder => "builder",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        FieldCategory::ALL
            .iter()
            .copied()
            .find(|category| category.type_name().eq_ignore_ascii_case(name))
    }

    /// Whether instances of this category hold a data value.
    pub fn is_input(self) -> bool {
        !matches!(
            self,
            FieldCategory::Content
                | FieldCategory::HtmlElement
                | FieldCategory::Panel
                | FieldCategory::FieldSet
                | FieldCategory::Columns
                | FieldCategory::Table
                | FieldCategory::Tabs
                | FieldCategory::Wizard
                | FieldCategory::Pdf
                | FieldCategory::Builder
        )
    }

    /// Containers whose children are repeated once per data row.
    pub fn is_row_container(self) -> bool {
        matches!(self, FieldCategory::DataGrid | FieldCategory::EditGrid)
    }

    /// Containers that nest their children's data under their own key.
    pub fn nests_data(self) -> bool {
        self.is_row_container() || self == FieldCategory::Container
    }

    /// Categories rendering their own nested sub-tree instead of one input.
    pub fn manages_subtree(self) -> bool {
        matches!(
            self,
            FieldCategory::Wizard | FieldCategory::Pdf | FieldCategory::Builder
        )
    }

    pub fn has_children(self) -> bool {
        self.nests_data()
            || self.manages_subtree()
            || matches!(
                self,
                FieldCategory::Panel
                    | FieldCategory::FieldSet
                    | FieldCategory::Columns
                    | FieldCategory::Table
                    | FieldCategory::Tabs
            )
    }

    /// Value the engine stores when the field holds nothing.
    pub fn empty_value(self) -> Value {
        match self {
            FieldCategory::Checkbox | FieldCategory::Button => Value::Bool(false),
            FieldCategory::Number | FieldCategory::Currency => Value::Null,
            FieldCategory::SelectBoxes | FieldCategory::Container => Value::Object(Map::new()),
            FieldCategory::File | FieldCategory::DataGrid | FieldCategory::EditGrid => {
                Value::Array(Vec::new())
            }
            category if !category.is_input() => Value::Null,
            _ => Value::String(String::new()),
        }
    }
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip_through_lookup() {
        for category in FieldCategory::ALL {
            assert_eq!(
                FieldCategory::from_type_name(category.type_name()),
                Some(category)
            );
        }
        assert_eq!(
            FieldCategory::from_type_name("PHONENUMBER"),
            Some(FieldCategory::PhoneNumber)
        );
        assert_eq!(FieldCategory::from_type_name("hologram"), None);
    }

    #[test]
    fn empty_values_follow_category_shape() {
        assert_eq!(FieldCategory::Checkbox.empty_value(), Value::Bool(false));
        assert_eq!(FieldCategory::TextField.empty_value(), Value::String(String::new()));
        assert_eq!(FieldCategory::DataGrid.empty_value(), Value::Array(Vec::new()));
        assert_eq!(FieldCategory::Panel.empty_value(), Value::Null);
    }

    #[test]
    fn only_grids_repeat_rows() {
        let rows: Vec<_> = FieldCategory::ALL
            .into_iter()
            .filter(|category| category.is_row_container())
            .collect();
        assert_eq!(rows, vec![FieldCategory::DataGrid, FieldCategory::EditGrid]);
    }
}
