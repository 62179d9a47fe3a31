//! Wire format of the coordinator API: endpoints, request bodies and response decoding.

use ::core::fmt;

use ::cascada_common::{
    anyhow::{self, anyhow},
    error::{CascadaError, Result},
    serde::{
        de::{MapAccess, Visitor},
        Deserialize, Deserializer, Serialize,
    },
    serde_json::{self, Map, Value},
    tracing::warn,
    variable::{ScalarType, VariableStore},
};

pub(crate) const REGISTER_MASTER: &str = "/api/v1/register-master";
pub(crate) const UNREGISTER_MASTER: &str = "/api/v1/unregister-master";
pub(crate) const REGISTER_NODES: &str = "/api/v1/register-nodes";
pub(crate) const FETCH_WORK_FOR_NODE: &str = "/api/v1/fetch-work-for-node";
pub(crate) const SUBMIT_RESULTS: &str = "/api/v1/submit-results";

/// Successful result of a protocol call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Everything the coordinator was expected to send was there.
    Complete,
    /// The call went through but optional fields were missing from the response.
    Incomplete { missing: Vec<&'static str> },
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn status_code(&self) -> i64 {
        match self {
            Self::Complete => 0,
            Self::Incomplete { .. } => -3,
        }
    }

    fn from_missing(missing: Vec<&'static str>) -> Self {
        if missing.is_empty() {
            Self::Complete
        } else {
            Self::Incomplete { missing }
        }
    }
}

/// Flatten the result of a protocol call into a single status integer:
/// `0` on success, a negative value for local failures and
/// the coordinator's own code otherwise.
pub fn status_code(result: &Result<Outcome>) -> i64 {
    match result {
        Ok(outcome) => outcome.status_code(),
        Err(e) => e.status_code(),
    }
}

#[derive(Serialize)]
#[serde(crate = "cascada_common::serde")]
pub(crate) struct RegisterRequest<'a> {
    pub(crate) key: &'a str,
    pub(crate) name: &'a str,
}

#[derive(Serialize)]
#[serde(crate = "cascada_common::serde")]
pub(crate) struct UnregisterRequest<'a> {
    pub(crate) mastertoken: &'a str,
}

#[derive(Serialize)]
#[serde(crate = "cascada_common::serde")]
pub(crate) struct AllocateNodesRequest<'a> {
    pub(crate) mastertoken: &'a str,
    pub(crate) nodenumber: usize,
}

#[derive(Serialize)]
#[serde(crate = "cascada_common::serde")]
pub(crate) struct FetchWorkRequest<'a> {
    pub(crate) mastertoken: &'a str,
    pub(crate) nodeid: &'a str,
}

#[derive(Serialize)]
#[serde(crate = "cascada_common::serde")]
pub(crate) struct SubmitResultsRequest<'a> {
    pub(crate) mastertoken: &'a str,
    pub(crate) nodeid: &'a str,
    pub(crate) payload: &'a Map<String, Value>,
}

/// Decoded JSON object returned by the coordinator.
pub(crate) struct Response {
    body: Map<String, Value>,
}

impl Response {
    /// Parse a response body. Anything but a JSON object is a decode failure.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(body)) => Ok(Self { body }),
            Ok(other) => Err(CascadaError::missing_info(anyhow!(
                "response is not a JSON object: {}",
                other
            ))),
            Err(e) => Err(CascadaError::missing_info(
                anyhow::Error::new(e).context("response is not valid JSON"),
            )),
        }
    }

    /// The mandatory integer `code` field.
    pub(crate) fn code(&self) -> Result<i64> {
        let code = self
            .body
            .get("code")
            .ok_or_else(|| CascadaError::missing_info(anyhow!("missing field `code`")))?;
        as_integer(code)
            .ok_or_else(|| CascadaError::missing_info(anyhow!("`code` is not a number: {}", code)))
    }

    /// Keep the response only when the coordinator reported success.
    pub(crate) fn into_success(self) -> Result<Self> {
        match self.code()? {
            0 => Ok(self),
            code => Err(CascadaError::coordinator(code)),
        }
    }

    fn required_str(&self, key: &str) -> Result<&str> {
        self.body
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| CascadaError::missing_info(anyhow!("missing string field `{}`", key)))
    }

    fn required_object(&self, key: &str) -> Result<&Map<String, Value>> {
        object_field(&self.body, key)
    }

    fn required_array(&self, key: &str) -> Result<&Vec<Value>> {
        self.body
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| CascadaError::missing_info(anyhow!("missing array field `{}`", key)))
    }
}

fn object_field<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a Map<String, Value>> {
    object
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| CascadaError::missing_info(anyhow!("missing object field `{}`", key)))
}

/// Integer value of a JSON number, truncating a fractional one.
fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|double| double as i64))
}

/// Everything a successful registration tells about the session.
pub(crate) struct Registration {
    pub(crate) master_token: String,
    pub(crate) name: String,
    pub(crate) project_name: Option<String>,
    pub(crate) algorithm_name: Option<String>,
    pub(crate) input_schema: VariableStore,
    pub(crate) output_schema: VariableStore,
    pub(crate) outcome: Outcome,
}

impl TryFrom<&str> for Registration {
    type Error = CascadaError;

    fn try_from(text: &str) -> Result<Self> {
        let response = Response::parse(text)?.into_success()?;
        let master_token = response.required_str("master_token")?.to_owned();
        let name = response.required_str("name")?.to_owned();
        let project = response.required_object("project")?;

        let mut missing = Vec::new();
        let project_name = project.get("name").and_then(Value::as_str).map(str::to_owned);
        if project_name.is_none() {
            warn!("Coordinator did not send a project name");
            missing.push("project.name");
        }
        let algorithm_name = project.get("algo").and_then(Value::as_str).map(str::to_owned);
        if algorithm_name.is_none() {
            warn!("Coordinator did not send an algorithm name");
            missing.push("project.algo");
        }

        object_field(project, "scheme_in")?;
        object_field(project, "scheme_out")?;
        // read again: the parsed map has already merged repeated keys
        let RegistrationSchemes {
            project: ProjectSchemes {
                scheme_in,
                scheme_out,
            },
        } = serde_json::from_str(text).map_err(|e| {
            CascadaError::missing_info(anyhow::Error::new(e).context("cannot read project schemes"))
        })?;
        let input_schema = decode_schema(scheme_in)?;
        let output_schema = decode_schema(scheme_out)?;

        Ok(Self {
            master_token,
            name,
            project_name,
            algorithm_name,
            input_schema,
            output_schema,
            outcome: Outcome::from_missing(missing),
        })
    }
}

#[derive(Deserialize)]
#[serde(crate = "cascada_common::serde")]
struct RegistrationSchemes {
    project: ProjectSchemes,
}

#[derive(Deserialize)]
#[serde(crate = "cascada_common::serde")]
struct ProjectSchemes {
    scheme_in: SchemeEntries,
    scheme_out: SchemeEntries,
}

/// Members of a scheme object in document order, repeated names included.
struct SchemeEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for SchemeEntries {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(SchemeEntriesVisitor)
    }
}

struct SchemeEntriesVisitor;

impl<'de> Visitor<'de> for SchemeEntriesVisitor {
    type Value = SchemeEntries;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an object of scheme entries")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry::<String, Value>()? {
            entries.push(entry);
        }
        Ok(SchemeEntries(entries))
    }
}

/// Turn `{name: type code}` entries into a store of unbound variables.
/// The first entry of a repeated name wins.
fn decode_schema(SchemeEntries(entries): SchemeEntries) -> Result<VariableStore> {
    let mut schema = VariableStore::new();
    for (name, code) in entries {
        let code = as_integer(&code).ok_or_else(|| {
            CascadaError::missing_info(anyhow!(
                "type of scheme entry `{}` is not a number: {}",
                name,
                code
            ))
        })?;
        if !schema.declare(&name, ScalarType::try_from(code)?) {
            warn!("Scheme entry `{}` repeated, keeping the first one", name);
        }
    }
    Ok(schema)
}

/// Node names granted by the coordinator, in the order it sent them.
/// The whole list is rejected if any entry is not a string or is repeated.
pub(crate) fn decode_node_names(response: Response) -> Result<Vec<String>> {
    let response = response.into_success()?;
    let mut names: Vec<String> = Vec::new();
    for entry in response.required_array("nodenames")? {
        let name = entry.as_str().ok_or_else(|| {
            CascadaError::missing_info(anyhow!("node name is not a string: {}", entry))
        })?;
        if names.iter().any(|known| known == name) {
            return Err(CascadaError::missing_info(anyhow!(
                "node name {:?} appears twice",
                name
            )));
        }
        names.push(name.to_owned());
    }
    Ok(names)
}

/// Write the `task-payload` of a fetch-work response into a node's variables.
///
/// A non-numeric value or a name the node never bound stops the decoding at once;
/// values already written stay as they are. A variable without storage is
/// skipped and reported after the rest of the payload has been applied.
pub(crate) fn apply_task_payload(response: Response, locals: &VariableStore) -> Result<()> {
    let response = response.into_success()?;
    let payload = response.required_object("task-payload")?;
    let mut last_error = None;
    for (name, value) in payload {
        let Value::Number(number) = value else {
            return Err(CascadaError::missing_info(anyhow!(
                "task value `{}` is not a number: {}",
                name,
                value
            )));
        };
        let variable = locals.lookup(name).ok_or_else(|| {
            CascadaError::unregistered_variable(anyhow!("node has no variable named `{}`", name))
        })?;
        match variable.location() {
            Some(location) => location.store_number(number),
            None => {
                warn!("Variable `{}` has no storage, skipping its task value", name);
                last_error = Some(CascadaError::invalid_type(anyhow!(
                    "variable `{}` of type {} has no storage",
                    name,
                    variable.scalar_type()
                )));
            }
        }
    }
    match last_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Build the submit-results payload: every input then output schema entry,
/// valued from the node's variable of the same name.
pub(crate) fn build_result_payload(
    input_schema: &VariableStore,
    output_schema: &VariableStore,
    locals: &VariableStore,
) -> Result<Map<String, Value>> {
    let mut payload = Map::new();
    for entry in input_schema.iter().chain(output_schema.iter()) {
        let local = locals.lookup(entry.name()).ok_or_else(|| {
            CascadaError::unregistered_variable(anyhow!(
                "node has no variable named `{}`",
                entry.name()
            ))
        })?;
        payload.insert(entry.name().to_owned(), Value::from(local.to_double()));
    }
    Ok(payload)
}

/// Status of a submit-results response. Only a non-zero `code` is an error:
/// a missing one still means the results were delivered.
pub(crate) fn submission_outcome(text: &str) -> Result<Outcome> {
    match Response::parse(text).and_then(|response| response.code()) {
        Ok(0) => Ok(Outcome::Complete),
        Ok(code) => Err(CascadaError::coordinator(code)),
        Err(e) => {
            warn!("Results submitted but the response could not be read: {}", e);
            Ok(Outcome::Incomplete {
                missing: vec!["code"],
            })
        }
    }
}
