mod quiz;

use std::sync::Arc;
use std::time::Duration;

use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use dotenv::dotenv;
use quiz::generator::QuestionGenerator;
use quiz::results::{self, PASS_ERROR_LIMIT};
use quiz::session::{Phase, QuizMachine};
use quiz::Difficulty;
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup},
};

type QuizDialogue = Dialogue<State, InMemStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Every exam asks the model for a full practice test.
const QUESTIONS_PER_EXAM: usize = 30;
const GENERATION_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    ReceiveLevelChoice,
    /// Waiting for the user to tap one of the current question's options.
    AnswerQuestion {
        machine: QuizMachine,
        difficulty: Difficulty,
    },
    /// Feedback is on screen; the staged option is only recorded when the
    /// user confirms with the advance button.
    ConfirmAnswer {
        machine: QuizMachine,
        difficulty: Difficulty,
        staged: usize,
    },
    ShowResults {
        difficulty: Difficulty,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting AutoEscuela AI bot...");

    let bot = Bot::from_env();

    let gpt = match std::env::var("CHATGPT_API_KEY") {
        Ok(key) => match ChatGPT::new(key) {
            Ok(mut gpt) => {
                gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
                gpt.config.timeout = GENERATION_TIMEOUT;
                Some(gpt)
            }
            Err(err) => {
                log::warn!("could not build the AI client, exams will use the fallback set: {err}");
                None
            }
        },
        Err(_) => {
            log::warn!("CHATGPT_API_KEY is not set, exams will use the fallback set");
            None
        }
    };

    let generator = Arc::new(QuestionGenerator::new(gpt));
    let generator_for_retry = generator.clone();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, InMemStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveLevelChoice].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, msg: Message| {
                    receive_level_choice(generator.clone(), bot, dialogue, msg)
                },
            ))
            .branch(
                dptree::case![State::AnswerQuestion { machine, difficulty }]
                    .endpoint(answer_question),
            )
            .branch(
                dptree::case![State::ConfirmAnswer {
                    machine,
                    difficulty,
                    staged
                }]
                .endpoint(confirm_answer),
            )
            .branch(dptree::case![State::ShowResults { difficulty }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, difficulty: Difficulty, msg: Message| {
                    show_results_choice(generator_for_retry.clone(), bot, dialogue, difficulty, msg)
                },
            )),
    )
    .dependencies(dptree::deps![InMemStorage::<State>::new()])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str = "¡Hola! Soy AutoEscuela AI 🚗 Te ayudo a preparar el examen teórico \
                             del permiso B con tests generados a tu medida.\n\n¿Qué nivel quieres practicar?";
const NEXT_BUTTON: &str = "Siguiente pregunta";
const RESULTS_BUTTON: &str = "Ver resultados";
const RETRY_BUTTON: &str = "Intentar otro test";
const HOME_BUTTON: &str = "Volver al inicio";

fn level_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![Difficulty::ALL
        .iter()
        .map(|d| KeyboardButton::new(d.label()))
        .collect::<Vec<_>>()])
}

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(level_keyboard())
        .await?;

    dialogue.update(State::ReceiveLevelChoice).await?;
    Ok(())
}

async fn receive_level_choice(
    generator: Arc<QuestionGenerator>,
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
) -> HandlerResult {
    let difficulty = match msg.text().and_then(Difficulty::from_label) {
        Some(difficulty) => difficulty,
        None => {
            bot.send_message(msg.chat.id, "Por favor, elige un nivel con los botones")
                .reply_markup(level_keyboard())
                .await?;
            return Ok(());
        }
    };

    begin_quiz(generator, &bot, &dialogue, msg.chat.id, difficulty).await
}

/// Generates a fresh exam and shows its first question. Shared by the level
/// selection and the retry path.
async fn begin_quiz(
    generator: Arc<QuestionGenerator>,
    bot: &Bot,
    dialogue: &QuizDialogue,
    chat_id: ChatId,
    difficulty: Difficulty,
) -> HandlerResult {
    // Nice to have while the model works, not worth failing over
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
    bot.send_message(
        chat_id,
        format!(
            "Generando test inteligente... Creando {QUESTIONS_PER_EXAM} preguntas de nivel {}.",
            difficulty.label()
        ),
    )
    .await?;

    let questions = generator.generate(difficulty, QUESTIONS_PER_EXAM).await;

    let mut machine = QuizMachine::new();
    machine.start(questions)?;

    send_current_question(bot, chat_id, &machine).await?;
    dialogue
        .update(State::AnswerQuestion { machine, difficulty })
        .await?;
    Ok(())
}

async fn send_current_question(bot: &Bot, chat_id: ChatId, machine: &QuizMachine) -> HandlerResult {
    let snapshot = machine.snapshot();
    let question = machine.current_question()?;

    let topic = question.topic.as_deref().unwrap_or("General");
    let text = format!(
        "Pregunta {} de {} · {}\n\n{}",
        snapshot.current_index + 1,
        snapshot.questions.len(),
        topic,
        question.text
    );

    let keyboard = KeyboardMarkup::new(
        question
            .options
            .iter()
            .map(|option| vec![KeyboardButton::new(option.clone())])
            .collect::<Vec<_>>(),
    );

    bot.send_message(chat_id, text).reply_markup(keyboard).await?;
    Ok(())
}

async fn answer_question(
    bot: Bot,
    dialogue: QuizDialogue,
    (machine, difficulty): (QuizMachine, Difficulty),
    msg: Message,
) -> HandlerResult {
    let question = machine.current_question()?;

    let selected = msg
        .text()
        .and_then(|text| question.options.iter().position(|option| option == text));
    let selected = match selected {
        Some(index) => index,
        None => {
            bot.send_message(msg.chat.id, "Por favor, elige una de las opciones con los botones")
                .await?;
            return Ok(());
        }
    };

    let feedback = if selected == question.correct_index {
        format!("¡Correcto! ✅\n\n{}", question.explanation)
    } else {
        format!(
            "Incorrecto ❌\nRespuesta correcta: {}\n\nPor qué: {}",
            question.correct_option(),
            question.explanation
        )
    };

    let snapshot = machine.snapshot();
    let advance_label = if snapshot.current_index + 1 == snapshot.questions.len() {
        RESULTS_BUTTON
    } else {
        NEXT_BUTTON
    };

    bot.send_message(msg.chat.id, feedback)
        .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(
            advance_label,
        )]]))
        .await?;

    dialogue
        .update(State::ConfirmAnswer {
            machine,
            difficulty,
            staged: selected,
        })
        .await?;
    Ok(())
}

async fn confirm_answer(
    bot: Bot,
    dialogue: QuizDialogue,
    (mut machine, difficulty, staged): (QuizMachine, Difficulty, usize),
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(NEXT_BUTTON) | Some(RESULTS_BUTTON) => {}
        _ => {
            bot.send_message(msg.chat.id, format!("Pulsa «{NEXT_BUTTON}» para continuar"))
                .await?;
            return Ok(());
        }
    }

    machine.submit_answer(staged)?;

    if machine.snapshot().phase == Phase::Finished {
        send_results(&bot, msg.chat.id, &machine).await?;
        dialogue.update(State::ShowResults { difficulty }).await?;
        return Ok(());
    }

    send_current_question(&bot, msg.chat.id, &machine).await?;
    dialogue
        .update(State::AnswerQuestion { machine, difficulty })
        .await?;
    Ok(())
}

async fn send_results(bot: &Bot, chat_id: ChatId, machine: &QuizMachine) -> HandlerResult {
    let snapshot = machine.snapshot();
    let results = results::evaluate(&snapshot)?;

    let verdict = if results.passed { "¡Apto! 🎉" } else { "No apto" };
    let summary = format!(
        "{verdict}\n\nHas acertado {} de {} preguntas ({} fallos).\nSe aprueba con menos de {} fallos.",
        results.score, results.total, results.error_count, PASS_ERROR_LIMIT
    );
    bot.send_message(chat_id, summary).await?;

    if !results.missed.is_empty() {
        bot.send_message(chat_id, "Repaso de errores:").await?;
        for missed in &results.missed {
            let review = format!(
                "#{} {}\n\nTu respuesta: {}\nCorrecta: {}\n\nPor qué: {}",
                missed.index + 1,
                missed.question.text,
                missed.question.options[missed.user_answer],
                missed.question.correct_option(),
                missed.question.explanation
            );
            bot.send_message(chat_id, review).await?;
        }
    }

    bot.send_message(chat_id, "¿Qué quieres hacer ahora?")
        .reply_markup(KeyboardMarkup::new(vec![vec![
            KeyboardButton::new(RETRY_BUTTON),
            KeyboardButton::new(HOME_BUTTON),
        ]]))
        .await?;
    Ok(())
}

async fn show_results_choice(
    generator: Arc<QuestionGenerator>,
    bot: Bot,
    dialogue: QuizDialogue,
    difficulty: Difficulty,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(RETRY_BUTTON) => begin_quiz(generator, &bot, &dialogue, msg.chat.id, difficulty).await,
        Some(HOME_BUTTON) => {
            bot.send_message(msg.chat.id, "¿Qué nivel quieres practicar?")
                .reply_markup(level_keyboard())
                .await?;
            dialogue.update(State::ReceiveLevelChoice).await?;
            Ok(())
        }
        _ => {
            bot.send_message(msg.chat.id, "Por favor, elige una de las opciones con los botones")
                .await?;
            Ok(())
        }
    }
}
