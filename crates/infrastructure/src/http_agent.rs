//! HTTP client for the browser-extension bridge.
//!
//! Lookups are delegated to an external agent process reachable over HTTP.
//! Each tier maps to one command type posted to the bridge's
//! `/api/extension/execute-command` endpoint; the bridge answers with a
//! `success`/`data` envelope that this client converts into domain findings.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use cascade_core::{AgentConfig, CascadeError, CascadeResult, ExtractionError};
use cascade_domain::entities::{
    Address, Owner, PersonFinding, PlateFinding, VehicleFinding, VehicleInfo, VehicleQuery,
};
use cascade_domain::ports::{ExtractionAgent, ExtractionResult};
use cascade_domain::value_objects::{NationalId, Plate};

const COMMAND_PATH: &str = "/api/extension/execute-command";
const CMD_VEHICLES: &str = "EXTRAIR_CARROS";
const CMD_PLATE: &str = "EXTRAIR_PLACA";
const CMD_PERSON: &str = "EXTRAIR_CPF";

/// HTTP implementation of [`ExtractionAgent`] speaking the bridge protocol.
///
/// The client timeout must stay below the tier rate window, otherwise a
/// hung lookup holds the in-flight flag past the next eligible dispatch.
pub struct HttpExtractionAgent {
    client: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl HttpExtractionAgent {
    pub fn new(config: &AgentConfig) -> CascadeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| CascadeError::config_error(format!("building http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.request_timeout_seconds,
        })
    }

    /// Posts one command envelope and unwraps the response envelope down to
    /// its `data` value.
    async fn execute<P: Serialize>(
        &self,
        command: &'static str,
        payload: P,
    ) -> Result<Value, ExtractionError> {
        let envelope = CommandEnvelope {
            id: Uuid::new_v4(),
            command,
            payload,
            timestamp: Utc::now(),
        };
        let url = format!("{}{COMMAND_PATH}", self.base_url);
        debug!(
            "sending agent command: type={command}, command_id={}",
            envelope.id
        );

        let response = self
            .client
            .post(&url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ExtractionError::AgentUnavailable(format!(
                "bridge returned {status}"
            )));
        }
        if status.is_client_error() {
            return Err(ExtractionError::Rejected(format!(
                "bridge returned {status}"
            )));
        }

        let body: ResponseEnvelope = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        if !body.success {
            // The agent reached the source and came back empty-handed.
            return Err(ExtractionError::NotFound(
                body.error
                    .unwrap_or_else(|| "agent reported no data".to_string()),
            ));
        }
        body.data.ok_or_else(|| {
            ExtractionError::MalformedResponse("success response without data".to_string())
        })
    }

    fn classify_transport(&self, err: reqwest::Error) -> ExtractionError {
        if err.is_timeout() {
            ExtractionError::Timeout(self.timeout_seconds)
        } else if err.is_connect() {
            ExtractionError::AgentUnavailable(format!("cannot reach bridge: {err}"))
        } else {
            ExtractionError::AgentUnavailable(err.to_string())
        }
    }
}

#[async_trait]
impl ExtractionAgent for HttpExtractionAgent {
    async fn fetch_vehicles(&self, query: &VehicleQuery) -> ExtractionResult<Vec<VehicleFinding>> {
        let payload = VehicleSearchPayload::from(query);
        let data = self.execute(CMD_VEHICLES, payload).await?;

        // The extension reports either a bare array or `{ "carros": [...] }`.
        let entries = match data {
            Value::Array(items) => items,
            Value::Object(ref map) => map
                .get("carros")
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| {
                    ExtractionError::MalformedResponse(
                        "vehicle list missing from agent response".to_string(),
                    )
                })?,
            _ => {
                return Err(ExtractionError::MalformedResponse(
                    "vehicle payload is neither array nor object".to_string(),
                ))
            }
        };

        let mut findings = Vec::with_capacity(entries.len());
        for entry in entries {
            let wire: VehicleWire = serde_json::from_value(entry.clone())
                .map_err(|e| ExtractionError::MalformedResponse(format!("vehicle entry: {e}")))?;
            findings.push(wire.into_finding(entry));
        }
        Ok(findings)
    }

    async fn fetch_plate_owner(&self, plate: &Plate) -> ExtractionResult<PlateFinding> {
        let data = self
            .execute(CMD_PLATE, PlateLookupPayload { placa: plate.as_str() })
            .await?;
        let wire: PlateOwnerWire = serde_json::from_value(data)
            .map_err(|e| ExtractionError::MalformedResponse(format!("plate payload: {e}")))?;
        Ok(wire.into_finding())
    }

    async fn fetch_person(&self, national_id: &NationalId) -> ExtractionResult<PersonFinding> {
        let data = self
            .execute(
                CMD_PERSON,
                PersonLookupPayload {
                    cpf: national_id.as_str(),
                },
            )
            .await?;
        let wire: PersonWire = serde_json::from_value(data)
            .map_err(|e| ExtractionError::MalformedResponse(format!("person payload: {e}")))?;
        Ok(wire.into_finding())
    }
}

#[derive(Debug, Serialize)]
struct CommandEnvelope<P> {
    id: Uuid,
    #[serde(rename = "type")]
    command: &'static str,
    payload: P,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct VehicleSearchPayload<'a> {
    modelo: &'a str,
    cor: &'a str,
    #[serde(rename = "anoInicio")]
    ano_inicio: String,
    #[serde(rename = "anoFim", skip_serializing_if = "Option::is_none")]
    ano_fim: Option<String>,
}

impl<'a> From<&'a VehicleQuery> for VehicleSearchPayload<'a> {
    fn from(query: &'a VehicleQuery) -> Self {
        // The bridge expects years as text, the way the source site takes them.
        Self {
            modelo: &query.model,
            cor: &query.color,
            ano_inicio: query.year_start.to_string(),
            ano_fim: query.year_end.map(|year| year.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct PlateLookupPayload<'a> {
    placa: &'a str,
}

#[derive(Debug, Serialize)]
struct PersonLookupPayload<'a> {
    cpf: &'a str,
}

#[derive(Debug, Deserialize)]
struct VehicleWire {
    placa: String,
    modelo: String,
    cor: String,
    #[serde(deserialize_with = "de_year")]
    ano: i32,
    #[serde(default)]
    chassi: Option<String>,
    #[serde(default)]
    renavam: Option<String>,
    #[serde(default = "unknown_source")]
    fonte: String,
}

impl VehicleWire {
    fn into_finding(self, raw_payload: Value) -> VehicleFinding {
        VehicleFinding {
            plate: self.placa,
            model: self.modelo,
            color: self.cor,
            year: self.ano,
            chassis: self.chassi,
            registration_id: self.renavam,
            source: self.fonte,
            raw_payload,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlateOwnerWire {
    proprietario: OwnerWire,
    #[serde(default)]
    veiculo: VehicleDetailWire,
    #[serde(default)]
    endereco: Option<AddressWire>,
    #[serde(default = "unknown_source")]
    fonte: String,
    #[serde(default, rename = "tempoResposta")]
    tempo_resposta: u64,
}

impl PlateOwnerWire {
    fn into_finding(self) -> PlateFinding {
        PlateFinding {
            owner: Owner {
                name: self.proprietario.nome,
                national_id: self.proprietario.cpf,
                id_document: self.proprietario.rg,
            },
            vehicle: VehicleInfo {
                make: self.veiculo.marca,
                model: self.veiculo.modelo,
                color: self.veiculo.cor,
                year: self.veiculo.ano,
                status: self.veiculo.situacao,
                category: self.veiculo.categoria,
            },
            address: self.endereco.map(Address::from),
            source: self.fonte,
            latency_ms: self.tempo_resposta,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwnerWire {
    nome: String,
    #[serde(default)]
    cpf: Option<String>,
    #[serde(default)]
    rg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VehicleDetailWire {
    #[serde(default)]
    marca: Option<String>,
    #[serde(default)]
    modelo: Option<String>,
    #[serde(default)]
    cor: Option<String>,
    #[serde(default)]
    ano: Option<String>,
    #[serde(default)]
    situacao: Option<String>,
    #[serde(default)]
    categoria: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonWire {
    nome: String,
    #[serde(default, rename = "dataNascimento")]
    data_nascimento: Option<NaiveDate>,
    #[serde(default, rename = "nomeMae")]
    nome_mae: Option<String>,
    #[serde(default)]
    endereco: Option<AddressWire>,
    #[serde(default)]
    telefones: Vec<String>,
    #[serde(default)]
    emails: Vec<String>,
    #[serde(default = "unknown_source")]
    fonte: String,
    #[serde(default, rename = "tempoResposta")]
    tempo_resposta: u64,
}

impl PersonWire {
    fn into_finding(self) -> PersonFinding {
        PersonFinding {
            name: self.nome,
            birth_date: self.data_nascimento,
            mother_name: self.nome_mae,
            address: self.endereco.map(Address::from),
            phones: self.telefones,
            emails: self.emails,
            source: self.fonte,
            latency_ms: self.tempo_resposta,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddressWire {
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    numero: String,
    #[serde(default)]
    complemento: Option<String>,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    cidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    cep: String,
}

impl From<AddressWire> for Address {
    fn from(wire: AddressWire) -> Self {
        Address {
            street: wire.logradouro,
            number: wire.numero,
            complement: wire.complemento,
            district: wire.bairro,
            city: wire.cidade,
            state: wire.uf,
            zip_code: wire.cep,
        }
    }
}

fn unknown_source() -> String {
    "unknown".to_string()
}

/// The extension reports years both as numbers and as text.
fn de_year<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i32),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(year) => Ok(year),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent() -> HttpExtractionAgent {
        HttpExtractionAgent::new(&AgentConfig {
            base_url: "http://localhost:3000/".to_string(),
            request_timeout_seconds: 25,
        })
        .unwrap()
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let agent = agent();
        assert_eq!(agent.base_url, "http://localhost:3000");
        assert_eq!(agent.timeout_seconds, 25);
    }

    #[test]
    fn test_command_envelope_uses_bridge_field_names() {
        let envelope = CommandEnvelope {
            id: Uuid::new_v4(),
            command: CMD_VEHICLES,
            payload: VehicleSearchPayload {
                modelo: "CIVIC",
                cor: "PRETO",
                ano_inicio: "2015".to_string(),
                ano_fim: Some("2020".to_string()),
            },
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "EXTRAIR_CARROS");
        assert_eq!(value["payload"]["modelo"], "CIVIC");
        assert_eq!(value["payload"]["anoInicio"], "2015");
        assert_eq!(value["payload"]["anoFim"], "2020");
        assert!(value["id"].is_string());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_search_payload_omits_missing_end_year() {
        let query = VehicleQuery {
            model: "GOL".to_string(),
            color: "BRANCO".to_string(),
            year_start: 2010,
            year_end: None,
        };

        let value = serde_json::to_value(VehicleSearchPayload::from(&query)).unwrap();
        assert_eq!(value["anoInicio"], "2010");
        assert!(value.get("anoFim").is_none());
    }

    #[test]
    fn test_vehicle_wire_accepts_text_and_numeric_years() {
        let text: VehicleWire = serde_json::from_value(json!({
            "placa": "ABC1234", "modelo": "CIVIC", "cor": "PRETO", "ano": "2018"
        }))
        .unwrap();
        assert_eq!(text.ano, 2018);

        let numeric: VehicleWire = serde_json::from_value(json!({
            "placa": "ABC1234", "modelo": "CIVIC", "cor": "PRETO", "ano": 2018
        }))
        .unwrap();
        assert_eq!(numeric.ano, 2018);
    }

    #[test]
    fn test_plate_wire_maps_owner_and_address() {
        let wire: PlateOwnerWire = serde_json::from_value(json!({
            "placa": "ABC1234",
            "proprietario": { "nome": "MARIA SILVA", "cpf": "52998224725", "rg": "12.345.678-9" },
            "veiculo": {
                "modelo": "CIVIC", "marca": "HONDA", "cor": "PRETO",
                "ano": "2018", "situacao": "Regular"
            },
            "endereco": {
                "logradouro": "Rua das Flores", "numero": "123", "bairro": "Centro",
                "cidade": "Sao Paulo", "uf": "SP", "cep": "01234-567"
            },
            "fonte": "elpump",
            "tempoResposta": 1500
        }))
        .unwrap();

        let finding = wire.into_finding();
        assert_eq!(finding.owner.name, "MARIA SILVA");
        assert_eq!(finding.owner.national_id.as_deref(), Some("52998224725"));
        assert_eq!(finding.owner.id_document.as_deref(), Some("12.345.678-9"));
        assert_eq!(finding.vehicle.make.as_deref(), Some("HONDA"));
        assert_eq!(finding.vehicle.status.as_deref(), Some("Regular"));
        assert_eq!(finding.address.unwrap().zip_code, "01234-567");
        assert_eq!(finding.latency_ms, 1500);
    }

    #[test]
    fn test_plate_wire_tolerates_missing_sections() {
        let wire: PlateOwnerWire = serde_json::from_value(json!({
            "proprietario": { "nome": "JOSE SANTOS" }
        }))
        .unwrap();

        let finding = wire.into_finding();
        assert_eq!(finding.owner.name, "JOSE SANTOS");
        assert!(finding.owner.national_id.is_none());
        assert!(finding.vehicle.model.is_none());
        assert!(finding.address.is_none());
        assert_eq!(finding.source, "unknown");
        assert_eq!(finding.latency_ms, 0);
    }

    #[test]
    fn test_person_wire_parses_birth_date_and_contacts() {
        let wire: PersonWire = serde_json::from_value(json!({
            "cpf": "52998224725",
            "nome": "MARIA SILVA",
            "dataNascimento": "1985-03-15",
            "nomeMae": "ANA SILVA",
            "endereco": {
                "logradouro": "Rua das Flores", "numero": "123", "complemento": "Apto 45",
                "bairro": "Centro", "cidade": "Sao Paulo", "uf": "SP", "cep": "01234-567"
            },
            "telefones": ["(11) 99999-9999"],
            "emails": ["maria@example.com"],
            "fonte": "elpump",
            "tempoResposta": 2000
        }))
        .unwrap();

        let finding = wire.into_finding();
        assert_eq!(finding.name, "MARIA SILVA");
        assert_eq!(
            finding.birth_date,
            Some(NaiveDate::from_ymd_opt(1985, 3, 15).unwrap())
        );
        assert_eq!(finding.mother_name.as_deref(), Some("ANA SILVA"));
        assert_eq!(finding.address.unwrap().complement.as_deref(), Some("Apto 45"));
        assert_eq!(finding.phones, vec!["(11) 99999-9999"]);
        assert_eq!(finding.emails, vec!["maria@example.com"]);
    }

    #[test]
    fn test_response_envelope_tolerates_sparse_bodies() {
        let failed: ResponseEnvelope = serde_json::from_value(json!({
            "commandId": "cmd-1", "success": false, "error": "no session",
            "timestamp": "2024-05-01T00:00:00Z"
        }))
        .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("no session"));
        assert!(failed.data.is_none());

        let bare: ResponseEnvelope = serde_json::from_value(json!({})).unwrap();
        assert!(!bare.success);
    }
}
