use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::BusinessStage;
use crate::tools::ToolKind;

/// A specialist within a stage profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentMember {
    pub name: &'static str,
    pub description: &'static str,
    pub instructions: &'static str,
    pub tools: Vec<ToolKind>,
}

/// Supervisor flow plus members for one stage. The members are folded into a single
/// prompt and their tools are offered together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentProfile {
    pub key: &'static str,
    pub stage: BusinessStage,
    pub flow: &'static str,
    pub members: Vec<AgentMember>,
    /// Stage persisted after any successful turn of this profile.
    pub advances_to: Option<BusinessStage>,
}

impl AgentProfile {
    /// Union of member tools, first occurrence wins.
    pub fn tools(&self) -> Vec<ToolKind> {
        let mut tools = Vec::new();
        for tool in self.members.iter().flat_map(|member| member.tools.iter()) {
            if !tools.contains(tool) {
                tools.push(*tool);
            }
        }
        tools
    }

    pub fn member_names(&self) -> Vec<&'static str> {
        self.members.iter().map(|member| member.name).collect()
    }

    pub fn system_prompt(&self, today: NaiveDate) -> String {
        let mut prompt = String::from(
            "Eres Broky, un asistente inmobiliario que conversa por WhatsApp con vendedores y compradores de propiedades. \
             Respondes siempre en español, con mensajes breves y amables, y haces una sola pregunta a la vez.\n\
             Actúas como supervisor de los agentes descritos abajo: en cada mensaje asume el rol del agente más adecuado \
             y usa únicamente las herramientas disponibles. No inventes datos que no te haya dado el usuario.\n",
        );
        prompt.push_str(&format!("Fecha actual: {}\n\n", today.format("%Y-%m-%d")));
        prompt.push_str(self.flow);
        prompt.push_str("\n\n## AGENTES DISPONIBLES\n");
        for (index, member) in self.members.iter().enumerate() {
            prompt.push_str(&format!(
                "\n### {}. {}\n{}\n{}\n",
                index + 1,
                member.name,
                member.description,
                member.instructions
            ));
            if !member.tools.is_empty() {
                let names: Vec<&str> = member.tools.iter().map(ToolKind::name).collect();
                prompt.push_str(&format!("Herramientas: {}\n", names.join(", ")));
            }
        }
        prompt
    }
}
