/// Names of the responses and status stores of one survey in a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
    pub responses: String,
    pub status: String,
}

impl StoreNames {
    /// `table_name` overrides the responses store name and prefixes the
    /// status store; otherwise both derive from the survey id.
    pub fn new(survey_id: &str, table_name: Option<&str>) -> Self {
        let table_name = table_name.map(str::trim).filter(|name| !name.is_empty());
        match table_name {
            Some(name) => Self {
                responses: name.to_string(),
                status: format!("{}_status", name),
            },
            None => Self {
                responses: format!("{}_responses", survey_id),
                status: format!("{}_status", survey_id),
            },
        }
    }
}
