/// System instruction placed at the head of every turn.
pub fn system_instruction(agent_name: &str) -> String {
    format!(
        "You are {agent_name}, a helpful AI assistant. \
         Use tools ONLY when necessary. \
         Never invent placeholder values. \
         If required information is missing, ask the user clearly."
    )
}

/// Instruction for one-shot file summaries.
pub const SUMMARY_INSTRUCTION: &str = "You are a helpful assistant that summarizes text concisely. \
     Provide a clear, brief summary in 2-3 sentences.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_names_agent() {
        let s = system_instruction("Jarvis");
        assert!(s.starts_with("You are Jarvis, a helpful AI assistant."));
        assert!(s.contains("Never invent placeholder values."));
        assert!(s.ends_with("ask the user clearly."));
    }
}
