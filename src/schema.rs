//! Database schema definitions
//!
//! Table and column names for the fixed provider tables, plus the naming
//! rule for the per-form data tables.

/// Messages table schema
pub mod message {
    /// Table name
    pub const TABLE: &str = "rapidandroid_message";
    /// Primary key column
    pub const ID: &str = "id";
    /// Sender or recipient phone column
    pub const PHONE: &str = "phone";
    /// Message body column
    pub const TEXT: &str = "text";
    /// Epoch milliseconds column
    pub const TIME: &str = "time";
    /// Direction flag column
    pub const IS_OUTGOING: &str = "is_outgoing";
    /// Flag for messages injected locally rather than received
    pub const IS_VIRTUAL: &str = "is_virtual";
    /// Foreign key to the monitor table
    pub const MONITOR_ID: &str = "monitor_id";
}

/// Monitors (known senders) table schema
pub mod monitor {
    /// Table name
    pub const TABLE: &str = "rapidandroid_monitor";
    /// Primary key column
    pub const ID: &str = "id";
    /// Phone identity column
    pub const PHONE: &str = "phone";
    /// Display alias column
    pub const ALIAS: &str = "alias";
    /// Email address column
    pub const EMAIL: &str = "email";
    /// First name column
    pub const FIRST_NAME: &str = "first_name";
    /// Last name column
    pub const LAST_NAME: &str = "last_name";
    /// Incoming message counter column
    pub const INCOMING_MESSAGES: &str = "incoming_messages";
}

/// Forms table schema
pub mod form {
    /// Table name
    pub const TABLE: &str = "rapidandroid_form";
    /// Primary key column
    pub const ID: &str = "id";
    /// Form name column
    pub const FORM_NAME: &str = "form_name";
    /// Description column
    pub const DESCRIPTION: &str = "description";
    /// Parser identifier column
    pub const PARSE_METHOD: &str = "parse_method";
    /// Keyword prefix column, also names the form's data table
    pub const PREFIX: &str = "prefix";
}

/// Fields table schema
pub mod field {
    /// Table name
    pub const TABLE: &str = "rapidandroid_field";
    /// Primary key column
    pub const ID: &str = "id";
    /// Foreign key to the form table
    pub const FORM_ID: &str = "form_id";
    /// Field name column
    pub const NAME: &str = "name";
    /// Foreign key to the field type table
    pub const FIELD_TYPE_ID: &str = "field_type_id";
    /// Prompt text column
    pub const PROMPT: &str = "prompt";
    /// Ordering index within the form
    pub const SEQUENCE: &str = "sequence";
}

/// Field types table schema
pub mod field_type {
    /// Table name
    pub const TABLE: &str = "rapidandroid_fieldtype";
    /// Primary key column (caller supplied)
    pub const ID: &str = "id";
    /// Type name column
    pub const NAME: &str = "name";
    /// Validation pattern column
    pub const REGEX: &str = "regex";
    /// Storage type tag column
    pub const DATATYPE: &str = "datatype";
}

/// Per-form data tables
pub mod form_data {
    /// Prefix shared by every dynamic table name
    pub const TABLE_PREFIX: &str = "formdata_";
    /// Primary key column
    pub const ID: &str = "id";
    /// Message the row was parsed from
    pub const MESSAGE_ID: &str = "message_id";

    /// Table name for a form prefix
    #[must_use]
    pub fn table_name(prefix: &str) -> String {
        format!("{TABLE_PREFIX}{prefix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_data_table_name() {
        assert_eq!(form_data::table_name("bednets"), "formdata_bednets");
    }
}
