use itertools::Itertools;

use super::{INSUFFICIENT_CONTEXT_ANSWER, RetrievedChunk};

const TEMPLATE_HEADER: &str = "\
Você é um assistente técnico-jurídico especializado em concessões rodoviárias,
regulamentos da ANTT (como RCR-2, RCR-3, RCR-4, RCR-5) e resoluções relacionadas.

Use APENAS as informações presentes nos trechos de \"Contexto\" para responder.

Regras:
- Responda sempre em português do Brasil, de forma objetiva e técnica.
- Quando possível, cite explicitamente o número da resolução, artigo, parágrafo
  ou cláusula contratual (por exemplo: \"art. 50 da RCR-3\", \"Resolução 6.053/2024\").
- Se a pergunta for muito genérica (por exemplo: apenas \"seguro\"), explique isso
  ao usuário e peça que detalhe melhor (ex: \"seguro de risco de engenharia\",
  \"seguro de responsabilidade civil - RC-OPER\", etc.).
- Se o contexto não tiver informação suficiente, diga claramente:
  \"";

/// Fill the answer template with the retrieved context and the question
#[inline]
pub fn build_prompt(chunks: &[RetrievedChunk], question: &str) -> String {
    let context = chunks.iter().map(|chunk| chunk.content.trim()).join("\n\n");

    format!(
        "{header}{fallback}\"\n\nContexto:\n{context}\n\nPergunta do usuário:\n{question}\n\n\
         Resposta (em português, organizada em tópicos quando fizer sentido):\n",
        header = TEMPLATE_HEADER,
        fallback = INSUFFICIENT_CONTEXT_ANSWER,
        context = context,
        question = question.trim(),
    )
}
