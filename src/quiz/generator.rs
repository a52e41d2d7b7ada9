use std::time::{SystemTime, UNIX_EPOCH};

use chatgpt::client::ChatGPT;
use chatgpt::types::CompletionResponse;
use thiserror::Error;

use super::{Difficulty, Question};

const SYSTEM_INSTRUCTION: &str = "Eres un profesor experto de autoescuela en España con más de 20 años de experiencia. \
Tu objetivo es preparar alumnos para el examen teórico del Permiso B de la DGT (Dirección General de Tráfico). \
Genera preguntas realistas, actualizadas a la normativa vigente. \
Evita preguntas ambiguas. \
Asegúrate de no repetir preguntas en el mismo lote. \
El tono debe ser educativo y profesional pero alentador.";

const BASIC_GUIDANCE: &str = "Céntrate en señales básicas, normas generales de prioridad y documentación simple. Preguntas fundamentales.";
const INTERMEDIATE_GUIDANCE: &str = "Incluye velocidad, adelantamientos, alumbrado, carga y seguridad vial. Nivel medio de dificultad.";
const ADVANCED_GUIDANCE: &str = "Preguntas trampa, situaciones complejas de tráfico, mecánica básica, primeros auxilios y normativa reciente. Alta dificultad.";

pub fn difficulty_guidance(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Basic => BASIC_GUIDANCE,
        Difficulty::Intermediate => INTERMEDIATE_GUIDANCE,
        Difficulty::Advanced => ADVANCED_GUIDANCE,
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no API credential configured")]
    MissingCredential,

    #[error("request to the model failed: {0}")]
    Api(#[from] chatgpt::err::Error),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("failed to decode the question batch: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("question {index} in the batch is invalid: {reason}")]
    InvalidQuestion { index: usize, reason: String },
}

/// The shape the model is instructed to emit. Ids are synthesized on our
/// side, the service never supplies one.
#[derive(Debug, serde::Deserialize)]
struct GeneratedQuestion {
    text: String,
    options: Vec<String>,
    #[serde(rename = "correctIndex")]
    correct_index: usize,
    explanation: String,
    #[serde(default)]
    topic: Option<String>,
}

/// Builds exam batches by asking the model for a JSON array of questions.
///
/// `generate` never fails: a missing credential, a transport error or an
/// unparseable reply all downgrade to the built-in fallback set, so a quiz
/// can always start.
pub struct QuestionGenerator {
    client: Option<ChatGPT>,
}

impl QuestionGenerator {
    pub fn new(client: Option<ChatGPT>) -> Self {
        Self { client }
    }

    pub async fn generate(&self, difficulty: Difficulty, count: usize) -> Vec<Question> {
        match self.request_batch(difficulty, count).await {
            Ok(questions) => {
                log::info!(
                    "generated {} questions (difficulty {})",
                    questions.len(),
                    difficulty.label()
                );
                questions
            }
            Err(err) => {
                log::warn!("question generation failed, using the built-in fallback set: {err}");
                fallback_questions()
            }
        }
    }

    async fn request_batch(
        &self,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<Question>, GenerationError> {
        let client = self.client.as_ref().ok_or(GenerationError::MissingCredential)?;

        let prompt = build_prompt(difficulty, count);
        log::debug!("generation prompt: {prompt}");

        let mut conversation = client.new_conversation_directed(SYSTEM_INSTRUCTION.to_string());
        let response: CompletionResponse = conversation.send_message(prompt).await?;
        let content = response.message().content.clone();
        log::debug!("generation completion: {content}");

        parse_batch(&content)
    }
}

fn build_prompt(difficulty: Difficulty, count: usize) -> String {
    // chatgpt_rs has no structured-output mode, so the schema is spelled out
    // in the prompt and the reply is decoded strictly.
    format!(
        "Genera {count} preguntas de test distintas y únicas para el carnet de conducir tipo B en España.\n\
         Nivel de dificultad: {}. {}\n\
         Devuelve estrictamente un array JSON, sin ningún texto adicional. Cada elemento debe tener \
         exactamente estos campos, todos obligatorios:\n\
         - \"text\": string con el enunciado de la pregunta.\n\
         - \"options\": array de 3 o 4 strings con las opciones de respuesta.\n\
         - \"correctIndex\": entero, índice (0-based) de la respuesta correcta en el array de opciones.\n\
         - \"explanation\": string con una explicación breve y didáctica de la respuesta correcta.\n\
         - \"topic\": string con el tema de la pregunta (ej: Señales, Velocidad, Seguridad).",
        difficulty.label(),
        difficulty_guidance(difficulty),
    )
}

fn parse_batch(raw: &str) -> Result<Vec<Question>, GenerationError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let generated: Vec<GeneratedQuestion> = serde_json::from_str(cleaned)?;
    if generated.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let batch_stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    generated
        .into_iter()
        .enumerate()
        .map(|(index, q)| {
            validate_question(index, &q)?;
            Ok(Question {
                id: format!("{batch_stamp}-{index}"),
                text: q.text,
                options: q.options,
                correct_index: q.correct_index,
                explanation: q.explanation,
                topic: q.topic,
            })
        })
        .collect()
}

fn validate_question(index: usize, q: &GeneratedQuestion) -> Result<(), GenerationError> {
    let reason = if q.text.trim().is_empty() {
        Some("empty question text".to_string())
    } else if !(3..=4).contains(&q.options.len()) {
        Some(format!("{} options, expected 3 or 4", q.options.len()))
    } else if q.correct_index >= q.options.len() {
        Some(format!(
            "correctIndex {} out of range for {} options",
            q.correct_index,
            q.options.len()
        ))
    } else if q.explanation.trim().is_empty() {
        Some("empty explanation".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(GenerationError::InvalidQuestion { index, reason }),
        None => Ok(()),
    }
}

/// Models like to wrap JSON in markdown fences even when told not to.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Static exam used whenever generation fails, so the session can always
/// start. Three questions on distinct topics, all structurally valid.
pub fn fallback_questions() -> Vec<Question> {
    vec![
        Question {
            id: "fallback-1".to_string(),
            text: "¿Cuál es la velocidad máxima genérica para un turismo en autovía?".to_string(),
            options: vec![
                "100 km/h".to_string(),
                "120 km/h".to_string(),
                "110 km/h".to_string(),
            ],
            correct_index: 1,
            explanation: "La velocidad máxima genérica para turismos y motocicletas en autovías \
                          y autopistas es de 120 km/h."
                .to_string(),
            topic: Some("Velocidad".to_string()),
        },
        Question {
            id: "fallback-2".to_string(),
            text: "Ante esta señal de STOP, ¿qué debe hacer?".to_string(),
            options: vec![
                "Detenerse siempre".to_string(),
                "Ceder el paso sin detenerse si no vienen coches".to_string(),
                "Detenerse solo si vienen vehículos".to_string(),
            ],
            correct_index: 0,
            explanation: "La señal de STOP obliga a detenerse siempre ante la próxima línea de \
                          detención o, si no existe, inmediatamente antes de la intersección."
                .to_string(),
            topic: Some("Señales".to_string()),
        },
        Question {
            id: "fallback-3".to_string(),
            text: "¿Está permitido circular marcha atrás en autopista?".to_string(),
            options: vec![
                "Sí, en casos de emergencia".to_string(),
                "No, nunca".to_string(),
                "Sí, si me he pasado la salida".to_string(),
            ],
            correct_index: 1,
            explanation: "En autopistas y autovías está prohibido circular marcha atrás."
                .to_string(),
            topic: Some("Maniobras".to_string()),
        },
    ]
}
