
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::Result;
use crate::query::{QueryResult, RagPipeline};

const PROMPT: &str = "💬 Sua pergunta (ou ENTER para sair): ";
const FAREWELL: &str = "👋 Até logo!";
const RULE: &str = "============================================================";

/// Ask questions read from `input` until an empty line or end of input.
///
/// Failed rounds are reported on `output` and the loop keeps going.
#[inline]
pub async fn run_query_loop<R, W>(pipeline: &RagPipeline, input: R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    writeln!(output, "\n✅ Sistema pronto! Faça suas perguntas.\n{}", RULE)?;

    loop {
        write!(output, "\n{}", PROMPT)?;
        output.flush()?;

        let question = match lines.next_line().await? {
            Some(line) => line.trim().to_string(),
            None => String::new(),
        };
        if question.is_empty() {
            writeln!(output, "\n{}", FAREWELL)?;
            return Ok(());
        }

        writeln!(output, "\n🔍 Buscando resposta...\n")?;
        match pipeline.ask(&question).await {
            Ok(result) => print_result(output, &result)?,
            Err(e) => {
                warn!("Question failed ({:?}): {}", e.kind(), e);
                writeln!(output, "\n❌ Erro: {}", e)?;
            }
        }
    }
}

/// Farewell printed when the loop is interrupted
#[inline]
pub fn print_farewell<W: Write>(output: &mut W) -> Result<()> {
    writeln!(output, "\n\n{}", FAREWELL)?;
    Ok(())
}

fn print_result<W: Write>(output: &mut W, result: &QueryResult) -> Result<()> {
    debug!("Answer cites {} sources", result.sources.len());

    writeln!(output, "{}", RULE)?;
    writeln!(output, "📝 RESPOSTA:\n{}", result.answer)?;
    writeln!(output, "\n{}", RULE)?;
    writeln!(output, "📚 FONTES CONSULTADAS:")?;
    for (i, source) in result.sources.iter().enumerate() {
        writeln!(output, "{}. {}", i + 1, source)?;
    }
    writeln!(output, "{}", RULE)?;
    Ok(())
}
