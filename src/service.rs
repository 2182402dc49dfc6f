use std::io::Read;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::info;

use crate::domain::UploadedStructure;
use crate::error::MolgenError;
use crate::filters::FilterConfig;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/generate_molecules/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

const STRUCTURE_FIELD: &str = "protein_file";
const STRUCTURE_MIME: &str = "chemical/x-pdb";

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub structures: Vec<UploadedStructure>,
    pub filters: FilterConfig,
}

impl GenerationRequest {
    pub fn new(structures: &[UploadedStructure], filters: &FilterConfig) -> Self {
        Self {
            structures: structures.to_vec(),
            filters: filters.clone(),
        }
    }
}

pub type ResponseBody = Box<dyn Read + Send>;

/// Remote generation endpoint. Implementations return the response body
/// only after a success status; the caller reads it incrementally.
pub trait GenerationService: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<ResponseBody, MolgenError>;
}

#[derive(Clone)]
pub struct GenerationHttpClient {
    client: Client,
    endpoint: String,
}

impl GenerationHttpClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, MolgenError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("molgen/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MolgenError::ServiceHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| MolgenError::ServiceHttp(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn build_form(request: &GenerationRequest) -> Result<Form, MolgenError> {
        let mut form = Form::new();
        for structure in &request.structures {
            let part = Part::bytes(structure.content.clone())
                .file_name(structure.name.clone())
                .mime_str(STRUCTURE_MIME)
                .map_err(|err| MolgenError::ServiceHttp(err.to_string()))?;
            form = form.part(STRUCTURE_FIELD, part);
        }
        for (name, value) in request.filters.form_fields() {
            form = form.text(name, value);
        }
        Ok(form)
    }

    fn handle_status(response: Response) -> Result<Response, MolgenError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .ok()
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| "generation request failed".to_string());
        Err(MolgenError::ServiceStatus { status, message })
    }
}

impl GenerationService for GenerationHttpClient {
    fn generate(&self, request: &GenerationRequest) -> Result<ResponseBody, MolgenError> {
        let form = Self::build_form(request)?;
        info!(
            endpoint = %self.endpoint,
            structures = request.structures.len(),
            num_molecules = request.filters.num_molecules(),
            "sending generation request"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|err| MolgenError::ServiceHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        Ok(Box::new(response))
    }
}
