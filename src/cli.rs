//! Terminal front end
//!
//! A line-oriented rendering of the credential form and the chat view. Input
//! and output are generic so the whole flow can be driven from tests.

use crate::app::App;
use crate::gateway::{AuthMode, Credentials, RemoteGateway};
use crate::messages::{SOURCES_LABEL, THINKING};
use crate::runtime::ConversationHandle;
use crate::state_machine::{Conversation, Session, Speaker, Turn, ViewEvent};
use crate::storage::KeyValueStore;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::broadcast;

const CMD_REGISTER: &str = "/kayit";
const CMD_LOGIN: &str = "/giris";
const CMD_LOGOUT: &str = "/cikis";
const CMD_QUIT: &str = "/quit";

/// Credential form state that is not part of the session machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthForm {
    pub mode: AuthMode,
}

impl AuthForm {
    pub fn title(self) -> &'static str {
        match self.mode {
            AuthMode::Login => "Giriş Yap",
            AuthMode::Register => "Kayıt Ol",
        }
    }

    pub fn switch_hint(self) -> String {
        match self.mode {
            AuthMode::Login => format!("Hesabınız yok mu? {CMD_REGISTER} yazın."),
            AuthMode::Register => format!("Zaten hesabınız var mı? {CMD_LOGIN} yazın."),
        }
    }

    /// Remember-me is offered only when signing in
    pub fn offers_remember(self) -> bool {
        self.mode == AuthMode::Login
    }
}

fn speaker_label(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::User => "Siz",
        Speaker::Assistant => "Eczacı AI",
    }
}

pub fn render_turn(turn: &Turn) -> String {
    let mut out = format!("{}: {}", speaker_label(turn.speaker), turn.text);
    let citations = turn.citations();
    if !citations.is_empty() {
        out.push_str(&format!("\n  {SOURCES_LABEL}: {}", citations.join(", ")));
    }
    out
}

pub fn render_transcript(conv: &Conversation) -> String {
    let mut lines: Vec<String> = conv.turns().iter().map(render_turn).collect();
    if conv.is_pending() {
        lines.push(THINKING.to_string());
    }
    lines.join("\n")
}

pub fn render_header(session: &Session) -> String {
    if session.role.is_elevated() {
        format!("Hoş geldiniz, {} (yönetici)", session.display_name)
    } else {
        format!("Hoş geldiniz, {}", session.display_name)
    }
}

enum Step {
    Continue,
    Quit,
}

pub struct Terminal<R, W> {
    input: Lines<BufReader<R>>,
    output: W,
    form: AuthForm,
}

impl<R, W> Terminal<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: BufReader::new(input).lines(),
            output,
            form: AuthForm::default(),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Alternate between the form and the chat until the user quits or input ends
    pub async fn run<G, K>(&mut self, app: &mut App<G, K>) -> io::Result<()>
    where
        G: RemoteGateway + 'static,
        K: KeyValueStore,
    {
        loop {
            let step = match app.conversation().cloned() {
                Some(conversation) => self.chat(app, &conversation).await?,
                None => self.credential_form(app).await?,
            };
            if matches!(step, Step::Quit) {
                return Ok(());
            }
        }
    }

    async fn credential_form<G, K>(&mut self, app: &mut App<G, K>) -> io::Result<Step>
    where
        G: RemoteGateway + 'static,
        K: KeyValueStore,
    {
        let form = self.form;
        self.write_line(&format!("\n== {} ==", form.title())).await?;
        self.write_line(&form.switch_hint()).await?;
        if let Some(error) = app.state().error().map(str::to_string) {
            self.write_line(&format!("Hata: {error}")).await?;
        }

        let Some(username) = self.prompt("Kullanıcı adı: ").await? else {
            return Ok(Step::Quit);
        };
        match username.trim() {
            CMD_QUIT => return Ok(Step::Quit),
            CMD_REGISTER | CMD_LOGIN => {
                self.form.mode = if username.trim() == CMD_REGISTER {
                    AuthMode::Register
                } else {
                    AuthMode::Login
                };
                app.dismiss_error();
                return Ok(Step::Continue);
            }
            _ => {}
        }

        let Some(password) = self.prompt("Şifre: ").await? else {
            return Ok(Step::Quit);
        };

        let remember = if self.form.offers_remember() {
            match self.prompt("Beni hatırla (e/h): ").await? {
                Some(answer) => matches!(answer.trim(), "e" | "E" | "evet"),
                None => return Ok(Step::Quit),
            }
        } else {
            false
        };

        if let Err(e) = app
            .sign_in(self.form.mode, Credentials::new(username, password), remember)
            .await
        {
            tracing::warn!(error = %e, "Sign-in request rejected");
        }
        Ok(Step::Continue)
    }

    async fn chat<G, K>(
        &mut self,
        app: &mut App<G, K>,
        conversation: &ConversationHandle,
    ) -> io::Result<Step>
    where
        G: RemoteGateway + 'static,
        K: KeyValueStore,
    {
        let header = render_header(&app.session());
        self.write_line(&format!("\n{header}")).await?;
        self.write_line(&format!("Çıkış için {CMD_LOGOUT}, kapatmak için {CMD_QUIT}."))
            .await?;
        self.write_line(&render_transcript(&conversation.snapshot()))
            .await?;

        let mut views = conversation.subscribe();
        loop {
            let Some(line) = self.prompt("> ").await? else {
                return Ok(Step::Quit);
            };
            match line.trim() {
                CMD_QUIT => return Ok(Step::Quit),
                CMD_LOGOUT => {
                    if let Err(e) = app.logout() {
                        tracing::warn!(error = %e, "Logout rejected");
                    }
                    return Ok(Step::Continue);
                }
                _ => {}
            }

            if !conversation.can_submit(&line) {
                continue;
            }
            if let Err(e) = conversation.submit(line).await {
                tracing::error!(error = %e, "Conversation stopped unexpectedly");
                return Ok(Step::Quit);
            }
            self.follow_exchange(conversation, &mut views).await?;
        }
    }

    /// Print view events until the exchange settles
    async fn follow_exchange(
        &mut self,
        conversation: &ConversationHandle,
        views: &mut broadcast::Receiver<ViewEvent>,
    ) -> io::Result<()> {
        loop {
            match views.recv().await {
                Ok(ViewEvent::TurnAppended { turn }) => {
                    self.write_line(&render_turn(&turn)).await?;
                }
                Ok(ViewEvent::PendingChanged { pending: true }) => {
                    self.write_line(THINKING).await?;
                }
                Ok(ViewEvent::PendingChanged { pending: false }) => return Ok(()),
                Ok(ViewEvent::InputCleared) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "View events lagged, redrawing");
                    if let Ok(conv) = conversation.wait_idle().await {
                        self.write_line(&render_transcript(&conv)).await?;
                    }
                    *views = conversation.subscribe();
                    return Ok(());
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    async fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        self.output.write_all(label.as_bytes()).await?;
        self.output.flush().await?;
        self.input.next_line().await
    }

    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }
}
