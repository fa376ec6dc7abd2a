mod category;
mod parser;
mod schema;

pub use category::FieldCategory;
pub use parser::parse_form_definition;
pub use schema::{
    FieldSchema, FormDefinition, FormDisplay, SelectOption, ValidationRules,
};
