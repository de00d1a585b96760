//! Topic explanations with optional visual aids.

use std::sync::Arc;

use crate::config::VisualConfig;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::session::Session;
use crate::visual::{extract_mermaid_block, fallback_diagram};

/// Explains topics through the language model.
pub struct Explainer {
    model: Arc<dyn LanguageModel>,
    visuals: VisualConfig,
}

impl Explainer {
    /// Creates an explainer backed by `model`.
    pub fn new(model: Arc<dyn LanguageModel>, visuals: VisualConfig) -> Self {
        Self { model, visuals }
    }

    /// Builds the explanation prompt.
    #[must_use]
    pub fn build_prompt(topic: &str) -> String {
        format!(
            "You are an expert teacher. Explain this topic clearly and engagingly:\n\n\
             Topic: {topic}\n\n\
             Provide:\n\
             1. Simple definition\n\
             2. Step-by-step breakdown\n\
             3. Real-world example\n\
             4. Key takeaway\n\n\
             Keep it 200-300 words, conversational tone."
        )
    }

    fn diagram_prompt(topic: &str) -> String {
        format!(
            "Draw a small Mermaid diagram (graph TD or flowchart LR, at most 8 nodes) \
             that summarizes this topic for a student:\n\n\
             Topic: {topic}\n\n\
             Reply with a single ```mermaid fenced code block and nothing else."
        )
    }

    async fn diagram(&self, topic: &str) -> String {
        if !self.visuals.generate_with_model {
            return fallback_diagram(topic);
        }
        match self.model.generate(&Self::diagram_prompt(topic)).await {
            Ok(reply) => extract_mermaid_block(&reply).unwrap_or_else(|| {
                tracing::debug!(topic, "Model reply had no mermaid block, using fallback");
                fallback_diagram(topic)
            }),
            Err(e) => {
                tracing::warn!(topic, error = %e, "Diagram generation failed, using fallback");
                fallback_diagram(topic)
            }
        }
    }

    /// Explains `topic` and records it as the session's current topic.
    ///
    /// Only the explanation call can fail. A failed diagram call falls back
    /// to the canned diagram table.
    pub async fn explain(&self, topic: &str, session: &mut Session) -> Result<String> {
        tracing::info!(session_id = %session.session_id, topic, "Explaining topic");

        let mut explanation = self.model.generate(&Self::build_prompt(topic)).await?;

        if self.visuals.enabled {
            let diagram = self.diagram(topic).await;
            explanation.push_str("\n\n**Visual Aid:**\n");
            explanation.push_str(&diagram);
        }

        session.current_topic = Some(topic.to_string());
        Ok(explanation)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::error::{GenerationErrorKind, TutorError};
    use crate::llm::testing::ScriptedModel;

    fn visuals(enabled: bool, generate_with_model: bool) -> VisualConfig {
        VisualConfig {
            enabled,
            generate_with_model,
        }
    }

    #[tokio::test]
    async fn test_explain_appends_fallback_diagram() {
        let model = Arc::new(ScriptedModel::replying("Water moves around."));
        let explainer = Explainer::new(model.clone(), visuals(true, false));
        let mut session = Session::new("s1", Utc::now());

        let reply = explainer
            .explain("Explain the water cycle", &mut session)
            .await
            .unwrap();

        assert!(reply.starts_with("Water moves around.\n\n**Visual Aid:**\n```mermaid\nflowchart LR"));
        assert_eq!(
            session.current_topic.as_deref(),
            Some("Explain the water cycle")
        );
        assert_eq!(model.calls(), 1);
        assert!(model.prompts()[0].contains("Topic: Explain the water cycle"));
    }

    #[tokio::test]
    async fn test_explain_without_visuals() {
        let explainer = Explainer::new(
            Arc::new(ScriptedModel::replying("Plain.")),
            visuals(false, true),
        );
        let mut session = Session::new("s1", Utc::now());

        assert_eq!(
            explainer.explain("gravity", &mut session).await.unwrap(),
            "Plain."
        );
    }

    #[tokio::test]
    async fn test_model_generated_diagram() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok("Atoms are small.".to_string()),
            Ok("```mermaid\ngraph TD\n  Atom-->Nucleus\n```".to_string()),
        ]));
        let explainer = Explainer::new(model.clone(), visuals(true, true));
        let mut session = Session::new("s1", Utc::now());

        let reply = explainer.explain("atoms", &mut session).await.unwrap();
        assert!(reply.ends_with("**Visual Aid:**\n```mermaid\ngraph TD\n  Atom-->Nucleus\n```"));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_model_diagram_failure_falls_back() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok("Cells are units of life.".to_string()),
            Err(TutorError::generation(GenerationErrorKind::Server, "boom")),
        ]));
        let explainer = Explainer::new(model, visuals(true, true));
        let mut session = Session::new("s1", Utc::now());

        let reply = explainer.explain("cells", &mut session).await.unwrap();
        assert!(reply.contains("B1[Nucleus]"));
    }

    #[tokio::test]
    async fn test_explain_failure_leaves_topic_unset() {
        let explainer = Explainer::new(
            Arc::new(ScriptedModel::new(vec![Err(TutorError::generation_timeout(5))])),
            visuals(true, false),
        );
        let mut session = Session::new("s1", Utc::now());

        assert!(explainer.explain("optics", &mut session).await.is_err());
        assert!(session.current_topic.is_none());
    }
}
