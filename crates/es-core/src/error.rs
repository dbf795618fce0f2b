use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unrecognized simulation artifact name: {name}")]
    Simulation { name: String },

    #[error("Unrecognized weather artifact name: {name}")]
    Weather { name: String },

    #[error("Unknown scenario: {text}")]
    Scenario { text: String },

    #[error("Invalid aging code: {text}")]
    AgingCode { text: String },
}
