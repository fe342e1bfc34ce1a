use anyhow::Result;
use std::sync::Arc;

use crate::artifacts::SdkLayout;
use crate::cli::args::{CompileArgs, ResidentArgs};
use crate::cli::output::TerminalSink;
use crate::compiler::{
    BatchCompiler, BatchOptions, CompilerOutput, CompilerSession, ExpressionRequest,
    RecompileRequest, SessionConfig,
};
use crate::fingerprint::JsonFingerprintStore;
use crate::process::TokioSpawner;

pub async fn handle_compile_command(args: CompileArgs) -> Result<()> {
    let compiler = BatchCompiler::new(
        Arc::new(SdkLayout::new(&args.engine)),
        Arc::new(TokioSpawner),
        Arc::new(TerminalSink::new()),
        Arc::new(JsonFingerprintStore),
    );

    let options = BatchOptions {
        sdk_root: args.sdk_root,
        main_path: args.main.to_string_lossy().into_owned(),
        output_file_path: args.output_dill,
        depfile_path: args.depfile,
        target: args.target,
        link_platform_kernel: !args.no_link_platform,
        aot: args.aot,
        track_widget_creation: args.track_widget_creation,
        extra_front_end_options: args.extra,
        incremental_byte_store_path: args.incremental_byte_store,
        packages_path: args.packages,
        filesystem_roots: args.filesystem_roots,
        filesystem_scheme: args.filesystem_scheme,
        product_vm: args.product,
    };

    match compiler.compile(&options).await? {
        Some(output) if output.error_count == 0 => {
            println!("{}", output.output_path);
            Ok(())
        }
        Some(output) => anyhow::bail!("compiled with {} error(s)", output.error_count),
        None => anyhow::bail!("compilation failed"),
    }
}

pub async fn handle_resident_command(args: ResidentArgs) -> Result<()> {
    let config = SessionConfig {
        sdk_root: args.sdk_root,
        target: args.target,
        track_widget_creation: args.track_widget_creation,
        packages_path: args.packages,
        filesystem_roots: args.filesystem_roots,
        filesystem_scheme: args.filesystem_scheme,
        initialize_from_dill: args.initialize_from_dill,
        unsafe_package_serialization: args.unsafe_package_serialization,
        experimental_flags: args.experiments,
    };
    let session = CompilerSession::new(
        config,
        Arc::new(SdkLayout::new(&args.engine)),
        Arc::new(TokioSpawner),
        Arc::new(TerminalSink::new()),
    );
    let main = args.main.to_string_lossy().into_owned();

    println!("kernelc resident mode");
    println!("Commands: recompile [files...], expr <expression>, accept, reject, reset, quit");

    let cold = session
        .recompile(RecompileRequest {
            main_path: Some(main.clone()),
            output_path: args.output_dill.clone(),
            ..RecompileRequest::default()
        })
        .await?;
    report(cold.as_ref());

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "q" {
            break;
        }
        if input == "accept" {
            session.accept();
        } else if input == "reset" {
            session.reset();
        } else if input == "reject" {
            report(session.reject().await?.as_ref());
        } else if let Some(expression) = input.strip_prefix("expr ") {
            let output = session
                .compile_expression(ExpressionRequest {
                    expression: expression.to_string(),
                    ..ExpressionRequest::default()
                })
                .await?;
            report(output.as_ref());
        } else if input == "recompile" || input.starts_with("recompile ") {
            let invalidated =
                input["recompile".len()..].split_whitespace().map(str::to_string).collect();
            let output = session
                .recompile(RecompileRequest {
                    main_path: Some(main.clone()),
                    invalidated_files: invalidated,
                    output_path: args.output_dill.clone(),
                    ..RecompileRequest::default()
                })
                .await?;
            report(output.as_ref());
        } else {
            eprintln!(
                "Unknown command. Use: recompile [files...], expr <expression>, \
                 accept, reject, reset, quit"
            );
        }
    }

    let code = session.shutdown().await;
    tracing::debug!("frontend server exited with code {code}");
    Ok(())
}

fn report(output: Option<&CompilerOutput>) {
    match output {
        Some(output) if output.error_count == 0 => println!("ok: {}", output.output_path),
        Some(output) => println!("{} error(s): {}", output.error_count, output.output_path),
        None => println!("failed"),
    }
}
