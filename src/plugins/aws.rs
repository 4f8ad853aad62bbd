//! Provider hooks for the core commands.
//!
//! Builds the stack template during `deploy`, submits it through the
//! provider pipeline, and drives single-function updates and `info`.

use crate::execution_context::ExecutionContext;
use crate::plugin::Plugin;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

const INITIALIZE: &str = "deploy:initialize";
const COMPILE_FUNCTIONS: &str = "deploy:compileFunctions";
const DEPLOY: &str = "deploy:deploy";
const DEPLOY_FUNCTION: &str = "deploy:function:deploy";
const INFO: &str = "info:info";

const DEPLOYMENT_BUCKET: &str = "ServerlessDeploymentBucket";
const NO_UPDATES_MESSAGE: &str = "No updates are to be performed";
const DEFAULT_MEMORY_SIZE: u32 = 1024;
const DEFAULT_TIMEOUT: u32 = 6;

pub struct AwsPlugin;

#[async_trait]
impl Plugin for AwsPlugin {
    fn name(&self) -> &str {
        "aws"
    }

    fn hooks(&self) -> Vec<String> {
        [INITIALIZE, COMPILE_FUNCTIONS, DEPLOY, DEPLOY_FUNCTION, INFO]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    async fn run_hook(&self, event: &str, ctx: &mut ExecutionContext) -> Result<()> {
        match event {
            INITIALIZE => {
                ctx.template = core_template();
                Ok(())
            }
            COMPILE_FUNCTIONS => compile_functions(ctx),
            DEPLOY => deploy_stack(ctx).await,
            DEPLOY_FUNCTION => deploy_function(ctx).await,
            INFO => show_info(ctx).await,
            other => bail!("aws plugin has no hook for '{}'", other),
        }
    }
}

/// The template every stack starts from: just the deployment bucket.
fn core_template() -> Value {
    json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Description": "The AWS CloudFormation template for this service",
        "Resources": {
            DEPLOYMENT_BUCKET: { "Type": "AWS::S3::Bucket" }
        },
        "Outputs": {
            "ServerlessDeploymentBucketName": { "Value": { "Ref": DEPLOYMENT_BUCKET } }
        }
    })
}

fn section<'a>(template: &'a mut Value, key: &str) -> Result<&'a mut Map<String, Value>> {
    template
        .as_object_mut()
        .ok_or_else(|| anyhow!("The template has not been initialized"))?
        .entry(key)
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow!("Template section \"{}\" is not an object", key))
}

/// `hello` -> `HelloLambdaFunction`.
fn function_logical_id(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("{}{}LambdaFunction", first.to_uppercase(), chars.as_str()),
        None => "LambdaFunction".to_string(),
    }
}

fn compile_functions(ctx: &mut ExecutionContext) -> Result<()> {
    let service = ctx.service();
    let stage = ctx.stage();

    let mut resources = Vec::new();
    for (name, function) in &service.functions {
        let handler = function.handler.as_deref().ok_or_else(|| {
            anyhow!(
                "Missing \"handler\" property in function \"{}\". Please make sure you point to the correct handler, for example: handler.hello",
                name
            )
        })?;
        let memory_size = function
            .memory_size
            .or(service.provider.memory_size)
            .unwrap_or(DEFAULT_MEMORY_SIZE);
        let timeout = function.timeout.or(service.provider.timeout).unwrap_or(DEFAULT_TIMEOUT);

        let logical_id = function_logical_id(name);
        let resource = json!({
            "Type": "AWS::Lambda::Function",
            "Properties": {
                "Code": {
                    "S3Bucket": { "Ref": DEPLOYMENT_BUCKET },
                    "S3Key": format!("{}/{}/{}.zip", service.service, stage, name),
                },
                "FunctionName": service.deployed_function_name(name, stage),
                "Handler": handler,
                "MemorySize": memory_size,
                "Timeout": timeout,
            }
        });
        let output = json!({
            "Description": "Lambda function info",
            "Value": { "Fn::GetAtt": [logical_id.clone(), "Arn"] },
        });
        resources.push((logical_id, resource, output));
    }

    debug!("Compiled {} function(s) into the template", resources.len());
    for (logical_id, resource, output) in resources {
        section(&mut ctx.template, "Resources")?.insert(logical_id.clone(), resource);
        section(&mut ctx.template, "Outputs")?.insert(format!("{}Arn", logical_id), output);
    }
    Ok(())
}

fn is_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !matches!(v, "false" | "0"))
}

async fn deploy_stack(ctx: &mut ExecutionContext) -> Result<()> {
    let provider = ctx.provider_handle();
    let stage = ctx.stage().to_string();
    let region = ctx.region().to_string();
    let stack = provider.stack_name(&stage);

    if is_enabled(ctx.option("noDeploy")) {
        info!("Skipping deployment of stack {}", stack);
        return Ok(());
    }
    if ctx.template.is_null() {
        bail!("Nothing to deploy: the template has not been initialized");
    }

    let params = json!({
        "StackName": stack,
        "TemplateBody": serde_json::to_string(&ctx.template)?,
        "Capabilities": ["CAPABILITY_IAM"],
    });
    match provider.request("CloudFormation", "updateStack", params, &stage, &region).await {
        Ok(_) => {
            println!("Stack update started for {}", stack);
            Ok(())
        }
        Err(err) if err.failure().is_some_and(|f| f.message.contains(NO_UPDATES_MESSAGE)) => {
            println!("Stack {} is already up to date", stack);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

async fn deploy_function(ctx: &mut ExecutionContext) -> Result<()> {
    let provider = ctx.provider_handle();
    let stage = ctx.stage().to_string();
    let region = ctx.region().to_string();

    let name = ctx
        .option("function")
        .ok_or_else(|| anyhow!("Missing \"--function\" option"))?
        .to_string();
    let function = ctx
        .service()
        .function(&name)
        .cloned()
        .ok_or_else(|| anyhow!("Function \"{}\" doesn't exist in this service", name))?;
    let deployed_name = ctx.service().deployed_function_name(&name, &stage);

    let lookup = provider
        .request("Lambda", "getFunction", json!({ "FunctionName": deployed_name }), &stage, &region)
        .await;
    if let Err(err) = lookup {
        let missing = err
            .failure()
            .is_some_and(|f| f.status_code == Some(404) || f.code.as_deref() == Some("ResourceNotFoundException"));
        if missing {
            bail!(
                "The function \"{}\" you want to update is not yet deployed. Please run \"deploy\" first",
                name
            );
        }
        return Err(err.into());
    }

    let settings = &ctx.service().provider;
    let mut params = json!({
        "FunctionName": deployed_name,
        "MemorySize": function.memory_size.or(settings.memory_size).unwrap_or(DEFAULT_MEMORY_SIZE),
        "Timeout": function.timeout.or(settings.timeout).unwrap_or(DEFAULT_TIMEOUT),
    });
    if let Some(handler) = &function.handler {
        params["Handler"] = json!(handler);
    }
    provider
        .request("Lambda", "updateFunctionConfiguration", params, &stage, &region)
        .await?;

    println!("Successfully deployed function: {}", name);
    Ok(())
}

fn format_info(ctx: &ExecutionContext, stack: &str, description: &Value) -> String {
    let mut lines = vec![
        "Service Information".to_string(),
        format!("service: {}", ctx.service().service),
        format!("stage: {}", ctx.stage()),
        format!("region: {}", ctx.region()),
        format!("stack: {}", stack),
    ];

    let outputs = description
        .pointer("/Stacks/0/Outputs")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if !outputs.is_empty() {
        lines.push("outputs:".to_string());
        for output in &outputs {
            let key = output["OutputKey"].as_str().unwrap_or("?");
            let value = output["OutputValue"].as_str().unwrap_or("");
            lines.push(format!("  {}: {}", key, value));
        }
    }
    lines.join("\n")
}

async fn show_info(ctx: &mut ExecutionContext) -> Result<()> {
    let provider = ctx.provider_handle();
    let stage = ctx.stage().to_string();
    let region = ctx.region().to_string();
    let stack = provider.stack_name(&stage);

    let description = provider
        .request("CloudFormation", "describeStacks", json!({ "StackName": stack }), &stage, &region)
        .await?;
    println!("{}", format_info(ctx, &stack, &description));
    Ok(())
}
